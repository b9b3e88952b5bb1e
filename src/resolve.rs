use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{AccessionId, Identifier, SchemeTag, is_accession};
use crate::error::SeqidError;
use crate::flatfile::{MetadataRecord, ParseWarning};
use crate::mapper::BatchMapper;
use crate::metadata::MetadataFetcher;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;
use crate::transport::Transport;

static SGD_LOCUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Y[A-Z][LR]\d{3}[WC]$").unwrap());
static REFSEQ_PROTEIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[NXYZ]P_\d+(\.\d+)?$").unwrap());
static REFSEQ_NUCLEOTIDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[NXYZ][MR]_\d+(\.\d+)?$").unwrap());
static DB_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_]+$").unwrap());

/// Recognizes one identifier family and names the scheme to map it from.
pub struct SchemeRule {
    pub name: &'static str,
    pub scheme: &'static str,
    pub matches: fn(&str) -> bool,
}

/// Evaluated in order; the first matching rule wins.
pub static SCHEME_RULES: &[SchemeRule] = &[
    SchemeRule {
        name: "locustag",
        scheme: "ENSEMBLGENOME_PRO_ID",
        matches: |id| SGD_LOCUS_RE.is_match(id),
    },
    SchemeRule {
        name: "refseqp",
        scheme: "P_REFSEQ_AC",
        matches: |id| REFSEQ_PROTEIN_RE.is_match(id),
    },
    SchemeRule {
        name: "refseqnt",
        scheme: "REFSEQ_NT_ID",
        matches: |id| REFSEQ_NUCLEOTIDE_RE.is_match(id),
    },
    SchemeRule {
        name: "ensembl",
        scheme: "ENSEMBL_ID",
        matches: |id| id.starts_with("ENS"),
    },
    SchemeRule {
        name: "uniprotid",
        scheme: SchemeTag::DISPLAY_ID,
        matches: |id| id.contains('_'),
    },
    SchemeRule {
        name: "seqid",
        scheme: SchemeTag::ACCESSION_OR_ID,
        matches: is_accession,
    },
];

pub fn classify(id: &str) -> Option<&'static SchemeRule> {
    SCHEME_RULES.iter().find(|rule| (rule.matches)(id))
}

/// Unwraps `db|id|...` headers such as `sp|P69905|HBA_HUMAN` to the id.
/// Headers whose first field is not a database tag are kept whole.
pub fn naked_seqid(raw: &str) -> &str {
    let mut pieces = raw.split('|');
    match (pieces.next(), pieces.next()) {
        (Some(db), Some(id)) if DB_PREFIX_RE.is_match(db) => id,
        _ => raw,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub raw: String,
    /// What was sent to the mapping service, tagged with the scheme it was
    /// classified as. Unclassified ids carry no scheme and are not sent.
    pub query: Identifier,
    pub accession: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentifyReport {
    pub resolutions: Vec<Resolution>,
    /// Keyed by the raw identifier as given.
    pub records: BTreeMap<String, MetadataRecord>,
    pub warnings: Vec<ParseWarning>,
}

impl IdentifyReport {
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.resolutions
            .iter()
            .filter(|res| !self.records.contains_key(&res.raw))
            .map(|res| res.raw.as_str())
    }
}

/// Classifies raw identifiers, maps each family into accessions in one
/// batch per scheme and attaches metadata.
pub struct Resolver<T, S> {
    mapper: BatchMapper<T, S>,
    metadata: MetadataFetcher<T, S>,
}

impl<T: Transport + Clone, S: CacheStore + Clone> Resolver<T, S> {
    pub fn new(transport: T, store: S, batch_size: usize) -> Self {
        Self {
            mapper: BatchMapper::new(transport.clone(), store.clone(), batch_size),
            metadata: MetadataFetcher::new(transport, store, batch_size),
        }
    }

    pub fn identify(
        &self,
        raw_ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<IdentifyReport, SeqidError> {
        let mut resolutions: Vec<Resolution> = raw_ids
            .iter()
            .map(|raw| {
                let naked = naked_seqid(raw.trim());
                let rule = classify(naked);
                let value = match (rule, naked.parse::<AccessionId>()) {
                    (Some(rule), Ok(acc)) if rule.scheme == SchemeTag::ACCESSION_OR_ID => {
                        acc.base().to_string()
                    }
                    _ => naked.to_string(),
                };
                let query = match rule.and_then(|rule| rule.scheme.parse().ok()) {
                    Some(scheme) => Identifier::with_scheme(value, scheme),
                    None => Identifier::new(value),
                };
                Resolution {
                    raw: raw.clone(),
                    query,
                    accession: None,
                }
            })
            .collect();

        let to = SchemeTag::accession();
        for rule in SCHEME_RULES {
            let ids: Vec<String> = resolutions
                .iter()
                .filter(|res| {
                    res.query
                        .scheme
                        .as_ref()
                        .is_some_and(|s| s.as_str() == rule.scheme)
                })
                .map(|res| res.query.value.clone())
                .collect();
            if ids.is_empty() {
                continue;
            }
            sink.event(ProgressEvent::new(format!(
                "phase=Identify; {} {} ids",
                ids.len(),
                rule.name
            )));
            let from: SchemeTag = rule.scheme.parse()?;
            let key = cache_key.map(|key| format!("{key}.{}", rule.name));
            let mapping = self
                .mapper
                .map_to_first(&from, &to, &ids, key.as_deref(), sink)?;
            for res in resolutions.iter_mut() {
                if res.query.scheme.as_ref() == Some(&from) {
                    res.accession = mapping.get(res.query.as_str()).cloned();
                }
            }
        }

        let accessions: Vec<String> = resolutions
            .iter()
            .filter_map(|res| res.accession.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut report = IdentifyReport::default();
        if !accessions.is_empty() {
            let key = cache_key.map(|key| format!("{key}.metadata"));
            let fetched = self.metadata.fetch(&accessions, key.as_deref(), sink)?;
            for res in &resolutions {
                let Some(accession) = &res.accession else {
                    debug!(raw = %res.raw, "identifier did not resolve");
                    continue;
                };
                if let Some(record) = fetched.records.get(accession) {
                    report.records.insert(res.raw.clone(), record.clone());
                }
            }
            report.warnings = fetched.warnings;
        }
        info!(
            requested = raw_ids.len(),
            found = report.records.len(),
            "identify finished"
        );
        report.resolutions = resolutions;
        Ok(report)
    }
}

/// Orders identifiers best first: found before missing, reviewed before
/// unreviewed, short (accession-sized) ids before long ones. Stable for ties.
pub fn rank_by_metadata(ids: &mut [String], records: &BTreeMap<String, MetadataRecord>) {
    ids.sort_by_key(|id| {
        let Some(record) = records.get(id) else {
            return Reverse(0u8);
        };
        let mut score = 1;
        if record.is_reviewed {
            score += 1;
        }
        if naked_seqid(id).len() <= 6 {
            score += 1;
        }
        Reverse(score)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_name(id: &str) -> Option<&'static str> {
        classify(id).map(|rule| rule.name)
    }

    #[test]
    fn rules_apply_in_priority_order() {
        assert_eq!(rule_name("YAL001C"), Some("locustag"));
        assert_eq!(rule_name("NP_064308.1"), Some("refseqp"));
        assert_eq!(rule_name("NP_064308"), Some("refseqp"));
        assert_eq!(rule_name("NM_000546.5"), Some("refseqnt"));
        assert_eq!(rule_name("ENSP00000269305"), Some("ensembl"));
        assert_eq!(rule_name("HBA_HUMAN"), Some("uniprotid"));
        assert_eq!(rule_name("A2AAA3"), Some("seqid"));
        assert_eq!(rule_name("A2AAA3-34"), Some("seqid"));
        assert_eq!(rule_name("NP_064308a1"), Some("uniprotid"));
        assert_eq!(rule_name("A2AAA3-a"), None);
        assert_eq!(rule_name("gene42"), None);
    }

    #[test]
    fn naked_seqid_strips_database_prefix() {
        assert_eq!(naked_seqid("sp|P69905|HBA_HUMAN"), "P69905");
        assert_eq!(naked_seqid("gi|4504347|ref|NP_000549.1|"), "4504347");
        assert_eq!(naked_seqid("123|P69905"), "123|P69905");
        assert_eq!(naked_seqid("P69905"), "P69905");
    }
}
