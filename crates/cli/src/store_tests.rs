use super::*;

fn open_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(dir.path(), None).expect("store opens");
    (dir, store)
}

#[test]
fn put_then_get_round_trips() {
    let (_dir, store) = open_store();
    let hash = store.put(b"hello world").unwrap();
    assert!(store.has(&hash));
    assert_eq!(store.get(&hash).unwrap(), b"hello world");
}

#[test]
fn put_is_idempotent() {
    let (_dir, store) = open_store();
    let h1 = store.put(b"same bytes").unwrap();
    let h2 = store.put(b"same bytes").unwrap();
    assert_eq!(h1, h2);
}

#[test]
fn get_detects_corruption() {
    let (dir, store) = open_store();
    let hash = store.put(b"trustworthy").unwrap();

    let hex = hash.to_hex();
    let path = dir.path().join("objects").join(&hex[0..2]).join(&hex[2..]);
    std::fs::write(&path, b"tampered").unwrap();

    let err = store.get(&hash).unwrap_err();
    assert!(matches!(err, Error::Corrupted { .. }));
}

#[test]
fn materialize_hardlinks_blob_to_destination() {
    let (dir, store) = open_store();
    let hash = store.put(b"materialize me").unwrap();

    let dest = dir.path().join("out").join("artifact.bin");
    store.materialize(&hash, &dest).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"materialize me");
}

#[test]
fn remove_deletes_blob() {
    let (_dir, store) = open_store();
    let hash = store.put(b"temporary").unwrap();
    store.remove(&hash).unwrap();
    assert!(!store.has(&hash));
}

#[test]
fn eviction_respects_size_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Store::open(dir.path(), Some(10)).expect("store opens");

    let h1 = store.put(b"0123456789").unwrap();
    assert!(store.has(&h1));

    let h2 = store.put(b"abcdefghij").unwrap();
    assert!(store.has(&h2));
    assert!(!store.has(&h1), "oldest blob should be evicted over budget");
}

#[test]
fn index_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let hash = {
        let store = Store::open(dir.path(), None).unwrap();
        let hash = store.put(b"persisted").unwrap();
        store.persist_index().unwrap();
        hash
    };

    let store = Store::open(dir.path(), None).unwrap();
    assert!(store.has(&hash));
}
