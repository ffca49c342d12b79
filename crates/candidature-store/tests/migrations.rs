use candidature_store::migrate::latest_version;
use candidature_store::paths::{db_path_in, resolve_db_path};
use candidature_store::Store;
use tempfile::TempDir;

#[test]
fn migrations_apply_once() {
    let store = Store::open_in_memory().expect("open in memory");
    assert_eq!(store.schema_version().expect("version before"), 0);
    store.migrate().expect("migrate");
    store.migrate().expect("migrate again");

    let version: i64 = store
        .connection()
        .query_row("SELECT version FROM candidature_schema LIMIT 1;", [], |row| {
            row.get(0)
        })
        .expect("schema version");
    assert_eq!(version, latest_version());
    assert_eq!(store.schema_version().expect("version"), latest_version());
}

#[test]
fn newer_database_is_rejected() {
    let store = Store::open_in_memory().expect("open in memory");
    store.migrate().expect("migrate");
    store
        .connection()
        .execute("UPDATE candidature_schema SET version = 99;", [])
        .expect("bump version");

    let err = store.migrate().expect_err("newer schema");
    assert!(err.to_string().contains("newer than available"));
}

#[test]
fn file_database_persists_between_opens() {
    let temp = TempDir::new().expect("temp dir");
    let requested = temp.path().join("nested").join("candidatures.sqlite3");
    let path = resolve_db_path(Some(requested.as_path())).expect("resolve");
    assert!(path.parent().expect("parent").exists());

    {
        let store = Store::open(&path).expect("open");
        store.migrate().expect("migrate");
    }
    let store = Store::open(&path).expect("reopen");
    assert_eq!(store.schema_version().expect("version"), latest_version());
    assert_eq!(store.candidatures().count().expect("count"), 0);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }
}

#[test]
fn default_file_name_is_stable() {
    let temp = TempDir::new().expect("temp dir");
    assert_eq!(
        db_path_in(temp.path()),
        temp.path().join("candidatures.sqlite3")
    );
}

#[test]
fn connect_reuses_a_prepared_database() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("candidatures.sqlite3");
    {
        let store = Store::open(&path).expect("open");
        store.migrate().expect("migrate");
    }

    let store = Store::connect(&path).expect("connect");
    assert_eq!(store.schema_version().expect("version"), latest_version());
    let journal: String = store
        .connection()
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(journal.to_lowercase(), "wal");
    let foreign_keys: i64 = store
        .connection()
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("foreign keys");
    assert_eq!(foreign_keys, 1);
}

#[test]
fn connect_does_not_create_missing_files() {
    let temp = TempDir::new().expect("temp dir");
    let path = temp.path().join("absent.sqlite3");
    assert!(Store::connect(&path).is_err());
    assert!(!path.exists());
}
