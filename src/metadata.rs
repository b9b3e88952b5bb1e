use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::cache::ResultCache;
use crate::domain::AccessionId;
use crate::error::SeqidError;
use crate::flatfile::{self, MetadataRecord, ParseReport, ParseWarning};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;
use crate::transport::{MetadataRequest, Transport};

/// Parsed metadata keyed by the identifiers that were asked for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataReport {
    pub records: BTreeMap<String, MetadataRecord>,
    /// Requested identifiers no record answered for.
    pub missing: Vec<String>,
    pub warnings: Vec<ParseWarning>,
}

/// Retrieves flat-record text for accessions in service-sized chunks and
/// caches each chunk's raw text as one shard.
pub struct MetadataFetcher<T, S> {
    transport: T,
    cache: ResultCache<S>,
    batch_size: usize,
}

impl<T: Transport, S: CacheStore> MetadataFetcher<T, S> {
    pub fn new(transport: T, store: S, batch_size: usize) -> Self {
        Self {
            transport,
            cache: ResultCache::new(store),
            batch_size: batch_size.max(1),
        }
    }

    pub fn cache(&self) -> &ResultCache<S> {
        &self.cache
    }

    pub fn fetch_raw(
        &self,
        accessions: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, SeqidError> {
        sink.event(ProgressEvent::new(format!(
            "phase=Metadata; {} accessions",
            accessions.len()
        )));
        self.cache
            .run_chunked(cache_key, accessions, self.batch_size, sink, |chunk| {
                let request = MetadataRequest {
                    accessions: chunk.to_vec(),
                };
                self.transport.fetch_records(&request)
            })
    }

    /// Fetches and parses records, then answers each requested identifier by
    /// primary accession, secondary accession or entry name. An isoform
    /// accession such as `P04637-2` falls back to `P04637`.
    pub fn fetch(
        &self,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<MetadataReport, SeqidError> {
        let shards = self.fetch_raw(ids, cache_key, sink)?;
        let mut parsed = ParseReport::default();
        for shard in &shards {
            let report = flatfile::parse(shard);
            parsed.records.extend(report.records);
            parsed.warnings.extend(report.warnings);
        }

        let index = RecordIndex::new(&parsed.records);
        let mut report = MetadataReport {
            warnings: parsed.warnings,
            ..MetadataReport::default()
        };
        for id in ids {
            if report.records.contains_key(id) {
                continue;
            }
            match index.lookup(id) {
                Some(accession) => {
                    report
                        .records
                        .insert(id.clone(), parsed.records[accession].clone());
                }
                None => {
                    if !report.missing.contains(id) {
                        report.missing.push(id.clone());
                    }
                }
            }
        }
        info!(
            requested = ids.len(),
            found = report.records.len(),
            warnings = report.warnings.len(),
            "metadata parsed"
        );
        Ok(report)
    }
}

/// Every name a record answers to, mapped to its primary accession.
struct RecordIndex<'a> {
    names: BTreeMap<String, &'a str>,
}

impl<'a> RecordIndex<'a> {
    fn new(records: &'a BTreeMap<String, MetadataRecord>) -> Self {
        let mut names = BTreeMap::new();
        for (primary, record) in records {
            names.insert(primary.clone(), primary.as_str());
            names
                .entry(record.entry_name.to_ascii_uppercase())
                .or_insert(primary.as_str());
        }
        // secondaries last so they never shadow a primary accession
        for (primary, record) in records {
            for accession in record.accessions() {
                names.entry(accession.to_string()).or_insert(primary.as_str());
            }
        }
        Self { names }
    }

    fn lookup(&self, id: &str) -> Option<&'a str> {
        let upper = id.trim().to_ascii_uppercase();
        if let Some(found) = self.names.get(&upper).copied() {
            return Some(found);
        }
        let accession: AccessionId = upper.parse().ok()?;
        accession.isoform()?;
        self.names.get(accession.base()).copied()
    }
}
