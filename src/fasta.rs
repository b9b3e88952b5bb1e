use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};

use camino::Utf8Path;

use crate::error::SeqidError;
use crate::flatfile::MetadataRecord;
use crate::store::FsStore;

pub const LINE_WIDTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub description: String,
    pub sequence: String,
}

/// Splits a header (with or without `>`) into id and description.
///
/// NCBI-style headers like `gi|4504347|ref|NP_000549.1| hemoglobin alpha`
/// keep the first two fields as the id and the last field as description.
pub fn parse_fasta_header(header: &str) -> (String, String) {
    let header = header.trim().trim_start_matches('>');
    let first = header.split_whitespace().next().unwrap_or("");
    if first.contains('|') {
        let fields: Vec<&str> = header.split('|').collect();
        let number = fields[1].split_whitespace().next().unwrap_or("");
        let id = format!("{}|{number}", fields[0]);
        let description = fields.last().map(|f| f.trim()).unwrap_or("").to_string();
        return (id, description);
    }
    let description = header[first.len()..].trim().to_string();
    (first.to_string(), description)
}

pub fn read_fasta<R: BufRead>(reader: R) -> Result<Vec<FastaRecord>, SeqidError> {
    let mut records: Vec<FastaRecord> = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        if line.starts_with('>') {
            let (id, description) = parse_fasta_header(&line);
            records.push(FastaRecord {
                id,
                description,
                sequence: String::new(),
            });
            continue;
        }
        if let Some(current) = records.last_mut() {
            if let Some(residues) = line.split_whitespace().next() {
                current.sequence.push_str(residues);
            }
        }
    }
    Ok(records)
}

/// Streams `reader` and keeps only records whose header id matches one of
/// `ids`. `seqid_fn` normalizes both sides before comparing, e.g. to unwrap
/// `sp|P69905|...`. Results are keyed by the entry of `ids` as given.
pub fn read_selected_fasta<R, F>(
    reader: R,
    ids: &[String],
    seqid_fn: F,
) -> Result<BTreeMap<String, FastaRecord>, SeqidError>
where
    R: BufRead,
    F: Fn(&str) -> String,
{
    let wanted: BTreeMap<String, &String> = ids.iter().map(|id| (seqid_fn(id), id)).collect();
    let mut selected: BTreeMap<String, FastaRecord> = BTreeMap::new();
    let mut live: Option<String> = None;
    for line in reader.lines() {
        let line = line.map_err(|err| SeqidError::Filesystem(err.to_string()))?;
        if line.starts_with('>') {
            let (id, description) = parse_fasta_header(&line);
            live = wanted.get(&seqid_fn(&id)).map(|original| (*original).clone());
            if let Some(key) = &live {
                selected.insert(
                    key.clone(),
                    FastaRecord {
                        id,
                        description,
                        sequence: String::new(),
                    },
                );
            }
            continue;
        }
        let Some(key) = &live else {
            continue;
        };
        if let (Some(record), Some(residues)) =
            (selected.get_mut(key), line.split_whitespace().next())
        {
            record.sequence.push_str(residues);
        }
    }
    Ok(selected)
}

pub fn read_fasta_file(path: &Utf8Path) -> Result<Vec<FastaRecord>, SeqidError> {
    let file = File::open(path).map_err(|err| SeqidError::Filesystem(format!("{path}: {err}")))?;
    read_fasta(BufReader::new(file))
}

pub fn write_fasta<W: Write>(
    mut writer: W,
    records: &[FastaRecord],
    width: usize,
) -> Result<(), SeqidError> {
    let io_err = |err: std::io::Error| SeqidError::Filesystem(err.to_string());
    let width = width.max(1);
    for record in records {
        if record.description.is_empty() {
            writeln!(writer, ">{}", record.id).map_err(io_err)?;
        } else {
            writeln!(writer, ">{} {}", record.id, record.description).map_err(io_err)?;
        }
        for line in record.sequence.as_bytes().chunks(width) {
            writer.write_all(line).map_err(io_err)?;
            writer.write_all(b"\n").map_err(io_err)?;
        }
    }
    writer.flush().map_err(io_err)
}

pub fn write_fasta_file(path: &Utf8Path, records: &[FastaRecord]) -> Result<(), SeqidError> {
    let mut buffer = Vec::new();
    write_fasta(&mut buffer, records, LINE_WIDTH)?;
    FsStore::write_bytes_atomic(path, &buffer)
}

/// One entry per reconstructed isoform, named by isoform id when the record
/// lists one. Isoforms without a sequence are skipped.
pub fn isoform_records(record: &MetadataRecord) -> Vec<FastaRecord> {
    record
        .isoforms
        .iter()
        .filter_map(|iso| {
            let sequence = iso.sequence.clone()?;
            let id = iso
                .isoform_id
                .clone()
                .unwrap_or_else(|| format!("{}-{}", record.accession, iso.name));
            Some(FastaRecord {
                id,
                description: format!("{} isoform {}", record.entry_name, iso.name),
                sequence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ncbi_header_keeps_gi_pair() {
        let (id, description) =
            parse_fasta_header(">gi|4504347|ref|NP_000549.1| hemoglobin subunit alpha");
        assert_eq!(id, "gi|4504347");
        assert_eq!(description, "hemoglobin subunit alpha");
    }

    #[test]
    fn plain_header_splits_on_first_space() {
        let (id, description) = parse_fasta_header(">P69905 Hemoglobin subunit alpha\n");
        assert_eq!(id, "P69905");
        assert_eq!(description, "Hemoglobin subunit alpha");
        assert_eq!(parse_fasta_header("Q9X"), ("Q9X".to_string(), String::new()));
    }

    #[test]
    fn write_wraps_and_reads_back() {
        let records = vec![FastaRecord {
            id: "P1".to_string(),
            description: "demo".to_string(),
            sequence: "A".repeat(60),
        }];
        let mut out = Vec::new();
        write_fasta(&mut out, &records, LINE_WIDTH).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().map(str::len).collect::<Vec<_>>(), vec![8, 50, 10]);
        assert_eq!(read_fasta(text.as_bytes()).unwrap(), records);
    }

    #[test]
    fn selected_records_are_keyed_by_requested_id() {
        let db = ">sp|P69905|HBA_HUMAN Hemoglobin subunit alpha
MVLSPADKTN
VKAAWGKVGA
>sp|P68871|HBB_HUMAN Hemoglobin subunit beta
MVHLTPEEKS
>tr|A0QKX7|A0QKX7_MYCA1 Elongation factor G
MAREFPLERV
";
        let ids = vec!["P69905".to_string(), "tr|A0QKX7|EFG".to_string()];
        let selected = read_selected_fasta(db.as_bytes(), &ids, |id| {
            crate::resolve::naked_seqid(id).to_string()
        })
        .unwrap();

        assert_eq!(selected.len(), 2);
        assert_eq!(selected["P69905"].sequence, "MVLSPADKTNVKAAWGKVGA");
        assert_eq!(selected["tr|A0QKX7|EFG"].sequence, "MAREFPLERV");
        assert!(!selected.values().any(|r| r.sequence.starts_with("MVHL")));
    }
}
