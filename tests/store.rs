use camino::Utf8PathBuf;

use uniprot_seqid::cache::ResultCache;
use uniprot_seqid::store::{CacheStore, FsStore, MemoryStore};

fn temp_store() -> (tempfile::TempDir, FsStore) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("cache")).unwrap();
    (temp, FsStore::new_with_root(root))
}

#[test]
fn fs_store_survives_reopen() {
    let (_temp, store) = temp_store();
    store.put("probe.NP_000508.1", br#"{"records":[]}"#).unwrap();

    let reopened = FsStore::new_with_root(store.root().to_owned());
    assert_eq!(
        reopened.get("probe.NP_000508.1").unwrap().as_deref(),
        Some(&br#"{"records":[]}"#[..])
    );
    assert_eq!(reopened.keys("probe.").unwrap().len(), 1);
}

#[test]
fn fs_store_overwrite_replaces_value() {
    let (_temp, store) = temp_store();
    store.put("resolve.sequential", b"{}").unwrap();
    store.put("resolve.sequential", b"{\"done\":1}").unwrap();
    assert_eq!(
        store.get("resolve.sequential").unwrap().as_deref(),
        Some(&b"{\"done\":1}"[..])
    );
    assert_eq!(store.keys("").unwrap(), vec!["resolve.sequential".to_string()]);
}

#[test]
fn similar_raw_identifiers_keep_separate_entries() {
    let (_temp, store) = temp_store();
    store.put("probe.sp|P1.ID", b"pipe").unwrap();
    store.put("probe.sp_P1.ID", b"underscore").unwrap();

    assert_eq!(store.get("probe.sp|P1.ID").unwrap().as_deref(), Some(&b"pipe"[..]));
    assert_eq!(
        store.get("probe.sp_P1.ID").unwrap().as_deref(),
        Some(&b"underscore"[..])
    );
    assert_eq!(
        store.keys("probe.sp").unwrap(),
        vec!["probe.sp_P1.ID".to_string(), "probe.sp|P1.ID".to_string()]
    );

    store.remove("probe.sp_P1.ID").unwrap();
    assert_eq!(store.keys("probe.").unwrap(), vec!["probe.sp|P1.ID".to_string()]);
}

#[test]
fn clear_on_missing_root_is_zero() {
    let (_temp, store) = temp_store();
    assert_eq!(store.clear().unwrap(), 0);
    assert!(store.keys("").unwrap().is_empty());
}

#[test]
fn memory_store_lists_by_prefix() {
    let store = MemoryStore::new();
    assert!(store.keys("").unwrap().is_empty());
    store.put("map.ID.ACC.shard.1", b"1").unwrap();
    store.put("map.ID.ACC.shard.0", b"0").unwrap();
    store.put("metadata.shard.0", b"m").unwrap();

    assert_eq!(store.keys("").unwrap().len(), 3);
    assert_eq!(
        store.keys("map.").unwrap(),
        vec![
            "map.ID.ACC.shard.0".to_string(),
            "map.ID.ACC.shard.1".to_string()
        ]
    );
    store.remove("metadata.shard.0").unwrap();
    assert_eq!(store.get("metadata.shard.0").unwrap(), None);
}

#[test]
fn corrupt_entry_reads_as_missing() {
    let store = MemoryStore::new();
    store.put("metadata.manifest", b"not json").unwrap();
    let cache = ResultCache::new(&store);
    let loaded: Option<Vec<String>> = cache.load("metadata.manifest").unwrap();
    assert_eq!(loaded, None);

    cache.save("metadata.manifest", &vec!["Q9TST1".to_string()]).unwrap();
    let loaded: Option<Vec<String>> = cache.load("metadata.manifest").unwrap();
    assert_eq!(loaded, Some(vec!["Q9TST1".to_string()]));
}
