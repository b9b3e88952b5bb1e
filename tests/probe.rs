use std::collections::BTreeSet;
use std::sync::Mutex;

use camino::Utf8PathBuf;

use uniprot_seqid::domain::{SCHEME_UNIVERSE, SchemeTag};
use uniprot_seqid::error::SeqidError;
use uniprot_seqid::probe::{ProbeOutcome, ProbeRecord, TypeProber};
use uniprot_seqid::progress::SilentSink;
use uniprot_seqid::store::{CacheStore, FsStore, MemoryStore};
use uniprot_seqid::transport::{MappingRequest, MetadataRequest, Transport};

/// Knows `NP_000508.1` as a RefSeq protein and as nothing else.
#[derive(Default)]
struct MockTransport {
    calls: Mutex<usize>,
    fail_after: Option<usize>,
}

impl Transport for MockTransport {
    fn map_ids(&self, request: &MappingRequest) -> Result<String, SeqidError> {
        let mut calls = self.calls.lock().unwrap();
        if self.fail_after.is_some_and(|limit| *calls >= limit) {
            return Err(SeqidError::TransportStatus {
                status: 503,
                message: "busy".to_string(),
            });
        }
        *calls += 1;
        assert_eq!(request.to.as_str(), "ACC");
        match request.from.as_str() {
            "P_REFSEQ_AC" => Ok(format!("From\tTo\n{}\tP69905\n", request.ids[0])),
            _ => Ok("From\tTo\n".to_string()),
        }
    }

    fn fetch_records(&self, _request: &MetadataRequest) -> Result<String, SeqidError> {
        Err(SeqidError::Transport("not implemented".to_string()))
    }
}

fn schemes(count: usize) -> Vec<SchemeTag> {
    SchemeTag::universe().into_iter().take(count).collect()
}

#[test]
fn universe_has_at_least_fifty_schemes() {
    assert!(SCHEME_UNIVERSE.len() >= 50);
    let unique: BTreeSet<_> = SCHEME_UNIVERSE.iter().collect();
    assert_eq!(unique.len(), SCHEME_UNIVERSE.len());
}

#[test]
fn resumed_probe_only_asks_unrecorded_schemes() {
    let store = MemoryStore::new();
    let id = "NP_000508.1";

    let first = MockTransport::default();
    TypeProber::new(&first, &store)
        .with_universe(schemes(10))
        .discover_schemes(id, Some("probe"), &SilentSink)
        .unwrap();
    assert_eq!(*first.calls.lock().unwrap(), 10);

    let second = MockTransport::default();
    let report = TypeProber::new(&second, &store)
        .with_universe(schemes(50))
        .discover_schemes(id, Some("probe"), &SilentSink)
        .unwrap();
    assert_eq!(*second.calls.lock().unwrap(), 40);
    assert_eq!(report.records.len(), 50);
    assert!(
        report
            .records
            .iter()
            .all(|record| record.outcome != ProbeOutcome::NotYetProbed)
    );
}

#[test]
fn compatible_schemes_are_those_that_map() {
    let transport = MockTransport::default();
    let prober = TypeProber::new(&transport, MemoryStore::new()).with_universe(vec![
        "EMBL_ID".parse().unwrap(),
        "P_REFSEQ_AC".parse().unwrap(),
        "PDB_ID".parse().unwrap(),
    ]);

    let report = prober
        .discover_schemes("NP_000508.1", None, &SilentSink)
        .unwrap();

    let compatible: Vec<&str> = report.compatible.iter().map(SchemeTag::as_str).collect();
    assert_eq!(compatible, vec!["P_REFSEQ_AC"]);
    assert_eq!(
        report.records[1].outcome,
        ProbeOutcome::Mapped {
            target: "P69905".to_string()
        }
    );
    assert_eq!(report.records[0].outcome, ProbeOutcome::Unmapped);
}

#[test]
fn interrupted_probe_keeps_finished_outcomes() {
    let store = MemoryStore::new();
    let id = "NP_000508.1";
    let universe = schemes(12);

    let flaky = MockTransport {
        fail_after: Some(5),
        ..MockTransport::default()
    };
    let err = TypeProber::new(&flaky, &store)
        .with_universe(universe.clone())
        .discover_schemes(id, Some("probe"), &SilentSink)
        .unwrap_err();
    assert!(err.is_retryable());

    let prober = TypeProber::new(MockTransport::default(), &store).with_universe(universe);
    let status = prober.status(id, "probe").unwrap();
    let recorded = status
        .iter()
        .filter(|record| record.outcome != ProbeOutcome::NotYetProbed)
        .count();
    assert_eq!(recorded, 5);
}

#[test]
fn lookalike_identifiers_keep_separate_outcomes() {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
    let store = FsStore::new_with_root(root);
    let universe = schemes(2);

    let transport = MockTransport::default();
    let prober = TypeProber::new(&transport, &store).with_universe(universe);
    prober
        .discover_schemes("sp|P1", Some("probe"), &SilentSink)
        .unwrap();
    let second = prober
        .discover_schemes("sp_P1", Some("probe"), &SilentSink)
        .unwrap();

    assert_eq!(*transport.calls.lock().unwrap(), 4);
    assert!(second.records.iter().all(|r| r.identifier == "sp_P1"));
}

#[test]
fn stored_record_for_another_identifier_is_ignored() {
    let store = MemoryStore::new();
    let scheme: SchemeTag = "P_REFSEQ_AC".parse().unwrap();
    let foreign = ProbeRecord {
        identifier: "NP_999999.1".to_string(),
        scheme: scheme.clone(),
        outcome: ProbeOutcome::Mapped {
            target: "Q99999".to_string(),
        },
    };
    store
        .put(
            &TypeProber::<MockTransport, MemoryStore>::probe_key("probe", "NP_000508.1", &scheme),
            &serde_json::to_vec(&foreign).unwrap(),
        )
        .unwrap();

    let transport = MockTransport::default();
    let prober = TypeProber::new(&transport, &store).with_universe(vec![scheme]);
    assert_eq!(
        prober.status("NP_000508.1", "probe").unwrap()[0].outcome,
        ProbeOutcome::NotYetProbed
    );

    let report = prober
        .discover_schemes("NP_000508.1", Some("probe"), &SilentSink)
        .unwrap();
    assert_eq!(*transport.calls.lock().unwrap(), 1);
    assert_eq!(
        report.records[0].outcome,
        ProbeOutcome::Mapped {
            target: "P69905".to_string()
        }
    );
}
