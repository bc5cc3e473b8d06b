use std::fs;

use harvest_core::{Cell, Snapshot};
use harvest_engine::{FsSnapshotStore, SnapshotStore, StoreError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn snapshot(rows: &[(&str, i64)]) -> Snapshot {
    Snapshot::new(
        vec!["id".into(), "n".into()],
        rows.iter()
            .map(|(id, n)| vec![Cell::from(*id), Cell::Int(*n)])
            .collect(),
    )
    .unwrap()
}

#[test]
fn missing_object_reads_as_none() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    assert_eq!(store.read("bronze", "news/raw.json").unwrap(), None);
}

#[test]
fn write_then_read_returns_same_rows() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    let original = Snapshot::new(
        vec!["id".into(), "n".into(), "note".into()],
        vec![
            vec![Cell::from("a"), Cell::Int(1), Cell::Null],
            vec![Cell::from("b"), Cell::Int(2), Cell::from("hi")],
        ],
    )
    .unwrap();

    store.write("bronze", "news/raw.json", &original).unwrap();

    assert!(dir.path().join("bronze/news/raw.json").is_file());
    assert_eq!(
        store.read("bronze", "news/raw.json").unwrap(),
        Some(original)
    );
}

#[test]
fn write_overwrites_whole_object() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    store
        .write("silver", "out.json", &snapshot(&[("a", 1), ("b", 2)]))
        .unwrap();
    store.write("silver", "out.json", &snapshot(&[("c", 3)])).unwrap();

    let read = store.read("silver", "out.json").unwrap().unwrap();
    assert_eq!(read, snapshot(&[("c", 3)]));
}

#[test]
fn corrupt_object_is_an_error_not_absent() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("bronze")).unwrap();
    fs::write(dir.path().join("bronze/raw.json"), b"{ not json").unwrap();

    let store = FsSnapshotStore::new(dir.path());
    let err = store.read("bronze", "raw.json").unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }), "{err}");
}

#[test]
fn ragged_columns_are_corrupt() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("bronze")).unwrap();
    fs::write(
        dir.path().join("bronze/raw.json"),
        br#"{"columns":[{"name":"id","values":["a","b"]},{"name":"n","values":[1]}]}"#,
    )
    .unwrap();

    let store = FsSnapshotStore::new(dir.path());
    assert!(matches!(
        store.read("bronze", "raw.json"),
        Err(StoreError::Corrupt { .. })
    ));
}

#[test]
fn unreadable_object_is_an_error() {
    let dir = TempDir::new().unwrap();
    // A directory where a file is expected cannot be read as a snapshot.
    fs::create_dir_all(dir.path().join("bronze/raw.json")).unwrap();

    let store = FsSnapshotStore::new(dir.path());
    assert!(matches!(
        store.read("bronze", "raw.json"),
        Err(StoreError::Read { .. })
    ));
}

#[test]
fn list_and_read_all_concatenates_in_path_order() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    store
        .write("bronze", "news/raw_2024_10_02.json", &snapshot(&[("b", 2)]))
        .unwrap();
    store
        .write("bronze", "news/raw_2024_10_01.json", &snapshot(&[("a", 1)]))
        .unwrap();
    store
        .write("bronze", "other/raw_2024_10_01.json", &snapshot(&[("z", 9)]))
        .unwrap();
    fs::write(dir.path().join("bronze/news/notes.txt"), b"ignored").unwrap();

    let all = store.list_and_read_all("bronze", "news").unwrap();
    assert_eq!(all, snapshot(&[("a", 1), ("b", 2)]));
}

#[test]
fn list_and_read_all_of_missing_prefix_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    let all = store.list_and_read_all("bronze", "nothing-here").unwrap();
    assert!(all.is_empty());
    assert!(all.is_schemaless());
}

#[test]
fn list_and_read_all_rejects_mixed_schemas() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    store.write("bronze", "news/a.json", &snapshot(&[("a", 1)])).unwrap();
    let other = Snapshot::new(vec!["id".into()], vec![vec![Cell::from("b")]]).unwrap();
    store.write("bronze", "news/b.json", &other).unwrap();

    assert!(matches!(
        store.list_and_read_all("bronze", "news"),
        Err(StoreError::Concat { .. })
    ));
}

#[test]
fn escaping_paths_are_rejected() {
    let dir = TempDir::new().unwrap();
    let store = FsSnapshotStore::new(dir.path());
    for (container, path) in [
        ("bronze", "../outside.json"),
        ("bronze", "/abs.json"),
        ("..", "x.json"),
        ("bronze", "a\\b.json"),
        ("", ""),
    ] {
        assert!(
            matches!(
                store.write(container, path, &snapshot(&[])),
                Err(StoreError::InvalidPath(_))
            ),
            "{container}/{path}"
        );
    }
}
