use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use serde::Serialize;

use crate::domain::{AccessionId, MappingPair, SchemeTag};
use crate::error::SeqidError;
use crate::fasta::{self, FastaRecord};
use crate::flatfile::{self, IsoformSequence, ParseWarning};
use crate::mapper::BatchMapper;
use crate::metadata::{MetadataFetcher, MetadataReport};
use crate::probe::{ProbeReport, TypeProber};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::resolve::{IdentifyReport, Resolver, rank_by_metadata};
use crate::sequential::SequentialMapper;
use crate::store::CacheStore;
use crate::transport::Transport;

#[derive(Debug, Clone, Serialize)]
pub struct MapResult {
    pub from: SchemeTag,
    pub to: SchemeTag,
    pub pairs: Vec<MappingPair>,
    pub unmapped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveResult {
    pub mapping: BTreeMap<String, AccessionId>,
    pub unmapped: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub reports: Vec<ProbeReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentifyResult {
    /// Input identifiers, best-annotated first.
    pub ranked: Vec<String>,
    #[serde(flatten)]
    pub report: IdentifyReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct IsoformEntry {
    pub accession: String,
    pub name: String,
    pub isoform_id: Option<String>,
    pub edits: usize,
    pub length: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IsoformResult {
    pub records: usize,
    pub isoforms: Vec<IsoformEntry>,
    pub warnings: Vec<ParseWarning>,
    pub output: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResult {
    pub removed: usize,
}

/// Runs the user-facing commands over one transport and one cache store.
pub struct App<T, S> {
    transport: T,
    store: S,
    batch_size: usize,
}

impl<T: Transport, S: CacheStore> App<T, S> {
    pub fn new(transport: T, store: S, batch_size: usize) -> Self {
        Self {
            transport,
            store,
            batch_size,
        }
    }

    pub fn map(
        &self,
        from: &SchemeTag,
        to: &SchemeTag,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<MapResult, SeqidError> {
        let mapper = BatchMapper::new(&self.transport, &self.store, self.batch_size);
        let pairs = mapper.map(from, to, ids, cache_key, sink)?;
        let mapped: BTreeSet<&str> = pairs.iter().map(|pair| pair.source.as_str()).collect();
        Ok(MapResult {
            from: from.clone(),
            to: to.clone(),
            unmapped: missing_from(ids, |id| mapped.contains(id)),
            pairs: pairs.into_iter().collect(),
        })
    }

    pub fn resolve(
        &self,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ResolveResult, SeqidError> {
        let mapper = SequentialMapper::new(&self.transport, &self.store);
        let mapping = mapper.map_one_by_one(ids, cache_key, sink)?;
        Ok(ResolveResult {
            unmapped: missing_from(ids, |id| mapping.contains_key(id)),
            mapping,
        })
    }

    pub fn probe(
        &self,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ProbeResult, SeqidError> {
        self.probe_schemes(ids, SchemeTag::universe(), cache_key, sink)
    }

    pub fn probe_schemes(
        &self,
        ids: &[String],
        schemes: Vec<SchemeTag>,
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ProbeResult, SeqidError> {
        let prober = TypeProber::new(&self.transport, &self.store).with_universe(schemes);
        let reports = ids
            .iter()
            .map(|id| prober.discover_schemes(id, cache_key, sink))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProbeResult { reports })
    }

    /// Fails with `NotFound` only when none of the accessions has a record.
    pub fn metadata(
        &self,
        accessions: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<MetadataReport, SeqidError> {
        let fetcher = MetadataFetcher::new(&self.transport, &self.store, self.batch_size);
        let report = fetcher.fetch(accessions, cache_key, sink)?;
        if report.records.is_empty() && !accessions.is_empty() {
            return Err(SeqidError::NotFound(accessions.join(", ")));
        }
        Ok(report)
    }

    pub fn identify(
        &self,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<IdentifyResult, SeqidError> {
        let resolver = Resolver::new(&self.transport, &self.store, self.batch_size);
        let report = resolver.identify(ids, cache_key, sink)?;
        let mut ranked = ids.to_vec();
        rank_by_metadata(&mut ranked, &report.records);
        Ok(IdentifyResult { ranked, report })
    }

    /// Parses a local flat-record file and rebuilds every described isoform,
    /// writing them as FASTA when `output` is given.
    pub fn isoforms(
        &self,
        input: &Utf8Path,
        output: Option<&Utf8Path>,
        sink: &dyn ProgressSink,
    ) -> Result<IsoformResult, SeqidError> {
        sink.event(ProgressEvent::new(format!("phase=Parse; {input}")));
        let text = fs::read_to_string(input.as_std_path())
            .map_err(|err| SeqidError::Filesystem(format!("{input}: {err}")))?;
        let report = flatfile::parse(&text);

        let mut entries = Vec::new();
        let mut fasta_records: Vec<FastaRecord> = Vec::new();
        for record in report.records.values() {
            for iso in &record.isoforms {
                if matches!(iso.sequence_ref, IsoformSequence::Displayed) {
                    continue;
                }
                entries.push(IsoformEntry {
                    accession: record.accession.clone(),
                    name: iso.name.clone(),
                    isoform_id: iso.isoform_id.clone(),
                    edits: iso.edits.len(),
                    length: iso.sequence.as_ref().map(String::len),
                });
            }
            fasta_records.extend(fasta::isoform_records(record));
        }

        if let Some(output) = output {
            fasta::write_fasta_file(output, &fasta_records)?;
            sink.event(ProgressEvent::new(format!(
                "phase=Write; {} sequences to {output}",
                fasta_records.len()
            )));
        }
        Ok(IsoformResult {
            records: report.records.len(),
            isoforms: entries,
            warnings: report.warnings,
            output: output.map(|path| path.to_string()),
        })
    }

    /// Drops cached entries whose key starts with `prefix`, or everything.
    pub fn clear(
        &self,
        prefix: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ClearResult, SeqidError> {
        sink.event(ProgressEvent::new("phase=Cache; clearing entries"));
        let keys = self.store.keys(prefix.unwrap_or(""))?;
        for key in &keys {
            self.store.remove(key)?;
        }
        Ok(ClearResult {
            removed: keys.len(),
        })
    }
}

fn missing_from(ids: &[String], found: impl Fn(&str) -> bool) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| !found(id) && seen.insert(id.as_str()))
        .cloned()
        .collect()
}
