use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::cache::ResultCache;
use crate::domain::{MappingPair, SchemeTag};
use crate::error::SeqidError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;
use crate::transport::{MappingRequest, Transport, parse_mapping_response};

/// Maps identifiers of one scheme into another in service-sized chunks,
/// caching each chunk's pairs under `<cache_key>.shard.<n>`.
pub struct BatchMapper<T, S> {
    transport: T,
    cache: ResultCache<S>,
    batch_size: usize,
}

impl<T: Transport, S: CacheStore> BatchMapper<T, S> {
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

    /// Returns every `(source, target)` pair the service knows for `ids`.
    /// Identifiers without a pair are unmapped; that is not an error.
    pub fn map(
        &self,
        from: &SchemeTag,
        to: &SchemeTag,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<BTreeSet<MappingPair>, SeqidError> {
        sink.event(ProgressEvent::new(format!(
            "phase=Map; {} ids {from} -> {to}",
            ids.len()
        )));
        let shards = self.cache.run_chunked(
            cache_key,
            ids,
            self.batch_size,
            sink,
            |chunk| -> Result<Vec<MappingPair>, SeqidError> {
                let request = MappingRequest {
                    from: from.clone(),
                    to: to.clone(),
                    ids: chunk.to_vec(),
                };
                let text = self.transport.map_ids(&request)?;
                parse_mapping_response(&text)
            },
        )?;
        let pairs: BTreeSet<MappingPair> = shards.into_iter().flatten().collect();
        info!(from = %from, to = %to, pairs = pairs.len(), "mapping finished");
        Ok(pairs)
    }

    /// Like [`map`](Self::map) but keeps one target per source: the first in
    /// target order, so reruns pick the same one.
    pub fn map_to_first(
        &self,
        from: &SchemeTag,
        to: &SchemeTag,
        ids: &[String],
        cache_key: Option<&str>,
        sink: &dyn ProgressSink,
    ) -> Result<BTreeMap<String, String>, SeqidError> {
        let pairs = self.map(from, to, ids, cache_key, sink)?;
        let mut mapping = BTreeMap::new();
        for pair in pairs {
            mapping.entry(pair.source).or_insert(pair.target);
        }
        Ok(mapping)
    }
}
