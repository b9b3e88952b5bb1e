use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};

use uniprot_seqid::app::App;
use uniprot_seqid::domain::SchemeTag;
use uniprot_seqid::error::SeqidError;
use uniprot_seqid::fasta::read_fasta_file;
use uniprot_seqid::output::JsonOutput;
use uniprot_seqid::store::{CacheStore, MemoryStore};
use uniprot_seqid::transport::{MappingRequest, MetadataRequest, Transport};

const MODERN: &str = include_str!("fixtures/modern_isoforms.txt");

#[derive(Default)]
struct MockUniprot {
    mapping_calls: Mutex<Vec<(String, Vec<String>)>>,
    metadata_calls: Mutex<usize>,
}

impl Transport for MockUniprot {
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError> {
        self.mapping_calls
            .lock()
            .unwrap()
            .push((request.from.to_string(), request.ids.clone()));
        let mut body = String::from("From\tTo\n");
        for id in &request.ids {
            let target = match (request.from.as_str(), id.as_str()) {
                ("P_REFSEQ_AC", "NP_000001.1") => Some("Q9TST1"),
                ("ACC+ID", "Q9TST1") | ("ACC+ID", "TEST1_HUMAN") => Some("Q9TST1"),
                ("ID", "EFG_MYCA1") => Some("A0QKX7"),
                _ => None,
            };
            if let Some(target) = target {
                body.push_str(&format!("{id}\t{target}\n"));
            }
        }
        Ok(body)
    }

    fn fetch_records(&self, _request: &MetadataRequest) -> Result<String, SeqidError> {
        *self.metadata_calls.lock().unwrap() += 1;
        Ok(MODERN.to_string())
    }
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn quiet() -> JsonOutput {
    JsonOutput::new(true)
}

#[test]
fn identify_resolves_mixed_identifiers() {
    let transport = MockUniprot::default();
    let app = App::new(&transport, MemoryStore::new(), 100);
    let input = ids(&["nonsense", "Q9TST1-2", "NP_000001.1", "sp|Q9TST1|TEST1_HUMAN"]);

    let result = app.identify(&input, Some("run"), &quiet()).unwrap();

    let report = &result.report;
    assert_eq!(report.records.len(), 3);
    assert!(report.records.values().all(|r| r.accession == "Q9TST1"));
    assert_eq!(report.unresolved().collect::<Vec<_>>(), vec!["nonsense"]);
    let queries: Vec<(&str, Option<&str>)> = report
        .resolutions
        .iter()
        .map(|res| (res.query.as_str(), res.query.scheme.as_ref().map(SchemeTag::as_str)))
        .collect();
    assert_eq!(
        queries,
        vec![
            ("nonsense", None),
            ("Q9TST1", Some("ACC+ID")),
            ("NP_000001.1", Some("P_REFSEQ_AC")),
            ("Q9TST1", Some("ACC+ID")),
        ]
    );
    assert_eq!(
        result.ranked,
        ids(&["sp|Q9TST1|TEST1_HUMAN", "Q9TST1-2", "NP_000001.1", "nonsense"])
    );

    let calls = transport.mapping_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], ("P_REFSEQ_AC".to_string(), ids(&["NP_000001.1"])));
    assert_eq!(calls[1], ("ACC+ID".to_string(), ids(&["Q9TST1"])));
    assert_eq!(*transport.metadata_calls.lock().unwrap(), 1);
}

#[test]
fn identify_rerun_is_served_from_cache() {
    let transport = MockUniprot::default();
    let store = MemoryStore::new();
    let app = App::new(&transport, &store, 100);
    let input = ids(&["NP_000001.1", "EFG_MYCA1"]);

    let first = app.identify(&input, Some("run"), &quiet()).unwrap();
    let second = app.identify(&input, Some("run"), &quiet()).unwrap();

    assert_eq!(first.ranked, second.ranked);
    assert_eq!(second.report.records.len(), 2);
    assert_eq!(transport.mapping_calls.lock().unwrap().len(), 2);
    assert_eq!(*transport.metadata_calls.lock().unwrap(), 1);
}

#[test]
fn metadata_without_any_record_is_not_found() {
    let app = App::new(MockUniprot::default(), MemoryStore::new(), 100);
    let err = app
        .metadata(&ids(&["Q99999"]), None, &quiet())
        .unwrap_err();
    assert_matches!(err, SeqidError::NotFound(_));

    let report = app
        .metadata(&ids(&["Q99999", "Q9TST0"]), None, &quiet())
        .unwrap();
    assert_eq!(report.missing, ids(&["Q99999"]));
    assert_eq!(report.records["Q9TST0"].accession, "Q9TST1");
}

#[test]
fn map_reports_unmapped_sources() {
    let app = App::new(MockUniprot::default(), MemoryStore::new(), 100);
    let result = app
        .map(
            &SchemeTag::display_id(),
            &SchemeTag::accession(),
            &ids(&["EFG_MYCA1", "CPC231_1796"]),
            None,
            &quiet(),
        )
        .unwrap();
    assert_eq!(result.pairs.len(), 1);
    assert_eq!(result.unmapped, ids(&["CPC231_1796"]));
}

#[test]
fn resolve_goes_one_by_one() {
    let transport = MockUniprot::default();
    let app = App::new(&transport, MemoryStore::new(), 100);
    let result = app
        .resolve(&ids(&["TEST1_HUMAN", "CPC231_1796"]), None, &quiet())
        .unwrap();

    assert_eq!(result.mapping["TEST1_HUMAN"].as_str(), "Q9TST1");
    assert_eq!(result.unmapped, ids(&["CPC231_1796"]));
    assert_eq!(transport.mapping_calls.lock().unwrap().len(), 2);
}

#[test]
fn isoforms_export_writes_fasta() {
    let temp = tempfile::tempdir().unwrap();
    let output = Utf8PathBuf::from_path_buf(temp.path().join("isoforms.fasta")).unwrap();
    let input = Utf8Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/legacy_isoforms.txt"
    ));
    let app = App::new(MockUniprot::default(), MemoryStore::new(), 100);

    let result = app.isoforms(input, Some(output.as_path()), &quiet()).unwrap();
    assert_eq!(result.records, 1);
    assert_eq!(result.isoforms.len(), 3);
    assert_eq!(result.warnings.len(), 1);

    let written = read_fasta_file(&output).unwrap();
    let names: Vec<&str> = written.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(names, vec!["Q9TST1-1", "Q9TST1-2", "Q9TST1-3", "Q9TST1-4"]);
    assert_eq!(written[2].sequence, "MAASDPSVEPPLSQETFSDLWK");
    assert_eq!(written[2].description, "TEST1_HUMAN isoform 3");
}

#[test]
fn clear_removes_matching_keys() {
    let store = MemoryStore::new();
    store.put("map.ID.ACC.manifest", b"{}").unwrap();
    store.put("map.ID.ACC.shard.0", b"{}").unwrap();
    store.put("resolve.sequential", b"{}").unwrap();
    let app = App::new(MockUniprot::default(), &store, 100);

    let cleared = app.clear(Some("map."), &quiet()).unwrap();
    assert_eq!(cleared.removed, 2);
    assert_eq!(store.keys("").unwrap(), vec!["resolve.sequential".to_string()]);
}
