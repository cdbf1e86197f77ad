// tests/integration_test.rs

//! Integration tests exercising the history façade end to end, across
//! both backend variants where the operation is shared between them.

use history_store::{HistoryStore, MockHistory, RootHash, SqliteHistory, Tag};
use tempfile::NamedTempFile;

fn temp_path() -> std::path::PathBuf {
    let f = NamedTempFile::new().unwrap();
    let path = f.path().to_path_buf();
    drop(f);
    std::fs::remove_file(&path).ok();
    path
}

fn hash() -> RootHash {
    RootHash::catalog_sha1("d13c98b4b48cedacda328eea4a30826333312c17").unwrap()
}

fn tag(name: &str, revision: u64, timestamp: i64) -> Tag {
    Tag::new(name, hash(), revision, timestamp)
}

#[test]
fn sqlite_round_trip_preserves_every_field() {
    let path = temp_path();
    let h = SqliteHistory::create(&path, "example.test.ch").unwrap();
    h.begin_transaction().unwrap();
    h.insert_branch(&history_store::Branch::new("release", "", 3))
        .unwrap();
    h.commit_transaction().unwrap();

    let t = tag("release-1.0", 4, 1700000000)
        .on_branch("release")
        .with_size(4096)
        .with_description("first release cut");
    h.insert(&t).unwrap();
    drop(h);

    let h = SqliteHistory::open(&path).unwrap();
    let round_tripped = h.get_by_name("release-1.0").unwrap();
    assert_eq!(round_tripped, t);
}

#[test]
fn get_number_of_tags_matches_insert_count_across_both_variants() {
    let mock = MockHistory::new("fqrn");
    let path = temp_path();
    let sqlite = SqliteHistory::create(&path, "fqrn").unwrap();

    for store in [&mock as &dyn HistoryStore, &sqlite as &dyn HistoryStore] {
        store.insert(&tag("a", 1, 10)).unwrap();
        store.insert(&tag("b", 2, 20)).unwrap();
        store.insert(&tag("c", 3, 30)).unwrap();
        assert_eq!(store.get_number_of_tags().unwrap(), 3);
    }
}

#[test]
fn remove_is_idempotent_and_isolated_across_both_variants() {
    let mock = MockHistory::new("fqrn");
    let path = temp_path();
    let sqlite = SqliteHistory::create(&path, "fqrn").unwrap();

    for store in [&mock as &dyn HistoryStore, &sqlite as &dyn HistoryStore] {
        store.insert(&tag("keep", 1, 1)).unwrap();
        store.insert(&tag("gone", 2, 2)).unwrap();
        store.remove("gone").unwrap();
        store.remove("gone").unwrap();
        assert!(!store.exists("gone").unwrap());
        assert!(store.exists("keep").unwrap());
    }
}

#[test]
fn scenario_s2_and_s3_rollback_and_malicious_rollback_sqlite() {
    let path = temp_path();
    let h = SqliteHistory::create(&path, "fqrn").unwrap();

    for (name, revision) in [
        ("foo", 1),
        ("bar", 2),
        ("moep", 4),
        ("moep_duplicate", 4),
        ("lol", 5),
        ("rofl", 8),
        ("also_rofl", 8),
    ] {
        h.insert(&tag(name, revision, 0)).unwrap();
    }

    h.begin_transaction().unwrap();
    h.rollback(&tag("moep", 10, 0)).unwrap();
    h.commit_transaction().unwrap();

    for name in ["foo", "bar", "moep", "moep_duplicate"] {
        assert!(h.exists(name).unwrap());
    }
    for name in ["lol", "rofl", "also_rofl"] {
        assert!(!h.exists(name).unwrap());
    }

    let mut forged = h.get_by_name("bar").unwrap();
    forged.name = "barlol".to_string();
    forged.revision = 11;

    h.begin_transaction().unwrap();
    let result = h.rollback(&forged);
    assert!(result.is_err());
    h.abort_transaction().unwrap();

    assert!(h.exists("bar").unwrap());
    assert!(!h.exists("barlol").unwrap());
}

#[test]
fn scenario_s5_prune_branches_only_on_sqlite_variant() {
    let path = temp_path();
    let h = SqliteHistory::create(&path, "fqrn").unwrap();

    h.begin_transaction().unwrap();
    for (name, parent, initial_revision) in [
        ("br1", "", 1),
        ("br2", "", 2),
        ("br3", "", 1),
        ("br4", "", 1),
        ("br1_1", "br1", 2),
        ("br1_1_1", "br1_1", 3),
        ("br2_1", "br2", 3),
        ("br2_1_1", "br2_1", 4),
        ("br3_1", "br3", 2),
        ("br3_1_1", "br3_1", 3),
    ] {
        h.insert_branch(&history_store::Branch::new(name, parent, initial_revision))
            .unwrap();
    }
    h.commit_transaction().unwrap();

    h.insert(&tag("tag_bar", 10, 0).on_branch("br2")).unwrap();
    h.insert(&tag("tag_baz", 11, 0).on_branch("br3")).unwrap();
    h.insert(&tag("tag_baz_deep", 12, 0).on_branch("br3_1_1"))
        .unwrap();

    h.begin_transaction().unwrap();
    h.prune_branches().unwrap();
    h.commit_transaction().unwrap();

    let mut remaining: Vec<_> = h
        .list_branches()
        .unwrap()
        .into_iter()
        .map(|b| (b.name, b.parent, b.initial_revision))
        .collect();
    remaining.sort();
    assert_eq!(
        remaining,
        vec![
            ("".to_string(), "".to_string(), 0),
            ("br2".to_string(), "".to_string(), 2),
            ("br3".to_string(), "".to_string(), 1),
            ("br3_1_1".to_string(), "br3".to_string(), 3),
        ]
    );

    // The mock variant deliberately declines this operation (spec §9).
    let mock = MockHistory::new("fqrn");
    assert!(mock.prune_branches().is_err());
}

/// Synthesizes a v1r2 fixture by hand (no legacy fixture binaries were
/// available) and exercises scenario S6: legacy read, then migration on
/// writable open, then recycle bin flushing.
#[test]
fn scenario_s6_legacy_v1r2_read_then_migrate() {
    let path = temp_path();
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE properties (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO properties (key, value) VALUES ('fqrn', 'alice.cern.ch');

            CREATE TABLE tags (
                name TEXT PRIMARY KEY,
                root_hash TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                description TEXT NOT NULL DEFAULT ''
            );
            INSERT INTO tags (name, root_hash, size, revision, timestamp)
                VALUES ('trunk', '4ec85fa1377d97959baad77868c641657c389392C', 56131584, 2171, 1492265000, '');
            INSERT INTO tags (name, root_hash, size, revision, timestamp)
                VALUES ('trunk-previous', '4ec85fa1377d97959baad77868c641657c389391C', 56131584, 2170, 1492264898, '');

            CREATE TABLE recycle_bin (root_hash TEXT PRIMARY KEY);
            INSERT INTO recycle_bin (root_hash) VALUES ('4ec85fa1377d97959baad77868c641657c389391C');
            ",
        )
        .unwrap();
    }

    let h = SqliteHistory::open(&path).unwrap();
    assert_eq!(h.fqrn(), "alice.cern.ch");
    let previous = h.get_by_name("trunk-previous").unwrap();
    assert_eq!(previous.size, 56131584);
    assert_eq!(previous.revision, 2170);
    assert_eq!(previous.timestamp, 1492264898);
    assert_eq!(previous.branch, "");
    assert_eq!(h.list().unwrap().len(), 2);
    assert_eq!(
        h.list_recycle_bin().unwrap(),
        vec!["4ec85fa1377d97959baad77868c641657c389391C".to_string()]
    );
    drop(h);

    let h = SqliteHistory::open_writable(&path).unwrap();
    h.insert(&tag("scratch", 2172, 1492265100)).unwrap();
    h.remove("scratch").unwrap();
    assert_eq!(h.list_recycle_bin().unwrap(), Vec::<String>::new());
}
