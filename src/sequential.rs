use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::domain::{AccessionId, SchemeTag};
use crate::error::SeqidError;
use crate::mapper::BatchMapper;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;
use crate::transport::Transport;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SequentialState {
    mapping: BTreeMap<String, AccessionId>,
    attempted: BTreeSet<String>,
}

/// Resolves identifiers of unknown scheme into accessions one request at a
/// time against the permissive `ACC+ID` scheme.
///
/// Slow, but one unrecognized identifier cannot spoil a whole batch. State is
/// saved after every request under `<cache_key>.sequential`.
pub struct SequentialMapper<T, S> {
    mapper: BatchMapper<T, S>,
}

impl<T: Transport, S: CacheStore> SequentialMapper<T, S> {
    pub fn new(transport: T, store: S) -> Self {
        Self {
            mapper: BatchMapper::new(transport, store, 1),
        }
    }

    pub fn state_key(key: &str) -> String {
        format!("{key}.sequential")
    }

    fn cache(&self) -> &ResultCache<S> {
        self.mapper.cache()
    }

    pub fn map_one_by_one(
        &self,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<BTreeMap<String, AccessionId>, SeqidError> {
        let state_key = cache_key.map(Self::state_key);
        let mut state = match &state_key {
            Some(key) => self.cache().load::<SequentialState>(key)?.unwrap_or_default(),
            None => SequentialState::default(),
        };

        let from = SchemeTag::accession_or_id();
        let to = SchemeTag::accession();
        let mut seen = BTreeSet::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if state.attempted.contains(id) {
                debug!(id = %id, "already resolved in a previous run");
                continue;
            }

            let pairs = self.mapper.map(&from, &to, std::slice::from_ref(id), None, sink)?;
            let target = pairs
                .iter()
                .find(|pair| &pair.source == id)
                .or_else(|| {
                    if pairs.len() == 1 {
                        pairs.iter().next()
                    } else {
                        None
                    }
                })
                .map(|pair| pair.target.clone());
            match target.map(|target| target.parse::<AccessionId>()) {
                Some(Ok(accession)) => {
                    sink.event(ProgressEvent::new(format!(
                        "phase=Resolve; {id} -> {accession}"
                    )));
                    state.mapping.insert(id.clone(), accession);
                }
                Some(Err(err)) => warn!(id = %id, error = %err, "service returned a non-accession target"),
                None => sink.event(ProgressEvent::new(format!("phase=Resolve; {id} unmapped"))),
            }
            state.attempted.insert(id.clone());

            if let Some(key) = &state_key {
                self.cache().save(key, &state)?;
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| state.mapping.get(id).map(|acc| (id.clone(), acc.clone())))
            .collect())
    }
}
