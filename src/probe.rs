use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::SchemeTag;
use crate::error::SeqidError;
use crate::mapper::BatchMapper;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Mapped { target: String },
    Unmapped,
    NotYetProbed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub identifier: String,
    pub scheme: SchemeTag,
    pub outcome: ProbeOutcome,
}

impl ProbeRecord {
    pub fn is_compatible(&self) -> bool {
        matches!(self.outcome, ProbeOutcome::Mapped { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub identifier: String,
    /// One record per candidate scheme, in probe order.
    pub records: Vec<ProbeRecord>,
    pub compatible: BTreeSet<SchemeTag>,
}

/// Discovers which schemes an identifier belongs to by trying every
/// candidate scheme against the accession scheme.
///
/// One round trip per candidate, so every outcome is persisted under
/// `<cache_key>.probe.<id>.<scheme>` as soon as it is known and skipped on
/// the next run.
pub struct TypeProber<T, S> {
    mapper: BatchMapper<T, S>,
    universe: Vec<SchemeTag>,
}

impl<T: Transport, S: CacheStore> TypeProber<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            mapper: BatchMapper::new(transport, store, 1),
            universe: SchemeTag::universe(),
        }
    }

    pub fn with_universe(mut self, universe: Vec<SchemeTag>) -> Self {
        self.universe = universe;
        self
    }

    pub fn universe(&self) -> &[SchemeTag] {
        &self.universe
    }

    pub fn probe_key(cache_key: &str, id: &str, scheme: &SchemeTag) -> String {
        format!("{cache_key}.probe.{id}.{scheme}")
    }

    /// A stored outcome for `(id, scheme)`. Records written for another pair
    /// under the same key count as unrecorded.
    fn recorded(
        &self,
        cache_key: &str,
        id: &str,
        scheme: &SchemeTag,
    ) -> Result<Option<ProbeRecord>, SeqidError> {
        let key = Self::probe_key(cache_key, id, scheme);
        let Some(record) = self.mapper.cache().load::<ProbeRecord>(&key)? else {
            return Ok(None);
        };
        if record.identifier != id || &record.scheme != scheme {
            warn!(key = %key, stored = %record.identifier, "probe entry belongs to another identifier");
            return Ok(None);
        }
        if record.outcome == ProbeOutcome::NotYetProbed {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Recorded state of every candidate for `id` without touching the
    /// network; unrecorded candidates are `NotYetProbed`.
    pub fn status(&self, id: &str, cache_key: &str) -> Result<Vec<ProbeRecord>, SeqidError> {
        self.universe
            .iter()
            .map(|scheme| {
                let recorded = self.recorded(cache_key, id, scheme)?;
                Ok(recorded.unwrap_or_else(|| ProbeRecord {
                    identifier: id.to_string(),
                    scheme: scheme.clone(),
                    outcome: ProbeOutcome::NotYetProbed,
                }))
            })
            .collect()
    }

    pub fn discover_schemes(
        &self,
        id: &str,
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<ProbeReport, SeqidError> {
        let to = SchemeTag::accession();
        let ids = [id.to_string()];
        let mut records = Vec::with_capacity(self.universe.len());

        sink.event(ProgressEvent::new(format!(
            "phase=Probe; {id} against {} schemes",
            self.universe.len()
        )));
        for scheme in &self.universe {
            if let Some(key) = cache_key {
                if let Some(record) = self.recorded(key, id, scheme)? {
                    debug!(id, scheme = %scheme, "probe already recorded");
                    records.push(record);
                    continue;
                }
            }

            let pairs = self.mapper.map(scheme, &to, &ids, None, sink)?;
            let outcome = match pairs.iter().next() {
                Some(pair) if pairs.len() == 1 && pair.source == id => ProbeOutcome::Mapped {
                    target: pair.target.clone(),
                },
                _ => ProbeOutcome::Unmapped,
            };
            let record = ProbeRecord {
                identifier: id.to_string(),
                scheme: scheme.clone(),
                outcome,
            };
            if let Some(key) = cache_key {
                self.mapper
                    .cache()
                    .save(&Self::probe_key(key, id, scheme), &record)?;
            }
            sink.event(ProgressEvent::new(match &record.outcome {
                ProbeOutcome::Mapped { target } => format!("phase=Probe; {id}:{scheme} -> {target}"),
                _ => format!("phase=Probe; {id}:{scheme} -> none"),
            }));
            records.push(record);
        }

        let compatible: BTreeSet<SchemeTag> = records
            .iter()
            .filter(|record| record.is_compatible())
            .map(|record| record.scheme.clone())
            .collect();
        info!(id, compatible = compatible.len(), "probe finished");
        Ok(ProbeReport {
            identifier: id.to_string(),
            records,
            compatible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_record_json_shape() {
        let record = ProbeRecord {
            identifier: "YOR261C".to_string(),
            scheme: "SGD_ID".parse().unwrap(),
            outcome: ProbeOutcome::Mapped {
                target: "Q08723".to_string(),
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["scheme"], "SGD_ID");
        assert_eq!(json["outcome"]["outcome"], "mapped");
        assert_eq!(json["outcome"]["target"], "Q08723");
    }
}
