use std::collections::BTreeSet;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SeqidError;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::store::CacheStore;

/// One persisted chunk result together with the ids it was computed for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<P> {
    pub requested: BTreeSet<String>,
    pub shard: usize,
    pub written_at: String,
    pub payload: P,
}

/// Records the full id set of the last logical call under a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    requested: BTreeSet<String>,
    batch_size: usize,
    written_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Fresh,
    Matching,
    Invalidated,
}

/// Typed JSON entries over a [`CacheStore`], with the requested-set
/// staleness rule applied per logical call and per shard.
#[derive(Debug, Clone)]
pub struct ResultCache<S> {
    store: S,
}

impl<S: CacheStore> ResultCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn shard_key(key: &str, index: usize) -> String {
        format!("{key}.shard.{index}")
    }

    pub fn manifest_key(key: &str) -> String {
        format!("{key}.manifest")
    }

    /// Reads and decodes an entry. A corrupt entry is reported and treated
    /// as missing so it gets recomputed.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SeqidError> {
        let Some(bytes) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable cache entry");
                Ok(None)
            }
        }
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SeqidError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|err| SeqidError::CacheCorrupt {
            key: key.to_string(),
            message: err.to_string(),
        })?;
        self.store.put(key, &bytes)
    }

    pub fn load_shard<P: DeserializeOwned>(
        &self,
        key: &str,
        index: usize,
        requested: &BTreeSet<String>,
    ) -> Result<Option<P>, SeqidError> {
        let shard_key = Self::shard_key(key, index);
        let Some(entry) = self.load::<CacheEntry<P>>(&shard_key)? else {
            return Ok(None);
        };
        if entry.shard != index || &entry.requested != requested {
            debug!(key = %shard_key, "cached shard was computed for a different id set");
            return Ok(None);
        }
        Ok(Some(entry.payload))
    }

    pub fn store_shard<P: Serialize>(
        &self,
        key: &str,
        index: usize,
        requested: &BTreeSet<String>,
        payload: &P,
    ) -> Result<(), SeqidError> {
        let entry = CacheEntry {
            requested: requested.clone(),
            shard: index,
            written_at: chrono::Utc::now().to_rfc3339(),
            payload,
        };
        self.save(&Self::shard_key(key, index), &entry)
    }

    /// Compares the id set of a new logical call with the one recorded under
    /// `key`. Any difference drops every shard of the key.
    pub fn begin(
        &self,
        key: &str,
        requested: &BTreeSet<String>,
        batch_size: usize,
        sink: &dyn ProgressSink,
    ) -> Result<CacheStatus, SeqidError> {
        let manifest_key = Self::manifest_key(key);
        let status = match self.load::<Manifest>(&manifest_key)? {
            Some(manifest)
                if &manifest.requested == requested && manifest.batch_size == batch_size =>
            {
                return Ok(CacheStatus::Matching);
            }
            Some(_) => {
                let removed = self.invalidate(key)?;
                info!(key, removed, "requested ids changed, recomputing");
                sink.event(ProgressEvent::new(format!(
                    "phase=Cache; {key} is stale, dropped {removed} shard(s)"
                )));
                CacheStatus::Invalidated
            }
            None => CacheStatus::Fresh,
        };
        let manifest = Manifest {
            requested: requested.clone(),
            batch_size,
            written_at: chrono::Utc::now().to_rfc3339(),
        };
        self.save(&manifest_key, &manifest)?;
        Ok(status)
    }

    /// Removes the manifest and all shards of `key`, returning the number of
    /// shards removed.
    pub fn invalidate(&self, key: &str) -> Result<usize, SeqidError> {
        let shards = self.store.keys(&format!("{key}.shard."))?;
        for shard in &shards {
            self.store.remove(shard)?;
        }
        self.store.remove(&Self::manifest_key(key))?;
        Ok(shards.len())
    }

    /// Deduplicates `ids`, splits them into consecutive chunks of at most
    /// `batch_size` and runs `fetch` on each chunk that has no valid shard.
    ///
    /// Each computed shard is persisted before the next chunk starts, so an
    /// interrupted call resumes at the first chunk without a shard. A failing
    /// chunk is not persisted and its error is returned as-is.
    pub fn run_chunked<P, F>(
        &self,
        key: Option<&str>,
        ids: &[String],
        batch_size: usize,
        sink: &dyn ProgressSink,
        mut fetch: F,
    ) -> Result<Vec<P>, SeqidError>
    where
        P: Serialize + DeserializeOwned,
        F: FnMut(&[String]) -> Result<P, SeqidError>,
    {
        let batch_size = batch_size.max(1);
        let requested: BTreeSet<String> = ids.iter().cloned().collect();
        let unique: Vec<String> = requested.iter().cloned().collect();
        if let Some(key) = key {
            self.begin(key, &requested, batch_size, sink)?;
        }

        let total = unique.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(total);
        for (index, chunk) in unique.chunks(batch_size).enumerate() {
            let chunk_ids: BTreeSet<String> = chunk.iter().cloned().collect();
            if let Some(key) = key {
                if let Some(payload) = self.load_shard(key, index, &chunk_ids)? {
                    debug!(key, shard = index, "reusing cached shard");
                    sink.event(ProgressEvent::new(format!(
                        "phase=Cache; shard {}/{total} from {key}",
                        index + 1
                    )));
                    results.push(payload);
                    continue;
                }
            }

            sink.event(ProgressEvent::new(format!(
                "phase=Fetch; shard {}/{total} ({} ids)",
                index + 1,
                chunk.len()
            )));
            let start = Instant::now();
            let payload = fetch(chunk)?;
            sink.event(ProgressEvent::timed(
                format!("phase=Fetch; shard {}/{total} done", index + 1),
                start.elapsed(),
            ));
            if let Some(key) = key {
                self.store_shard(key, index, &chunk_ids, &payload)?;
            }
            results.push(payload);
        }
        Ok(results)
    }
}
