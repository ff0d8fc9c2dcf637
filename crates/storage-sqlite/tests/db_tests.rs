//! Integration tests for database setup and path resolution.

use diesel::{sql_query, QueryableByName, RunQueryDsl};
use listrack_storage_sqlite::{create_pool, get_connection, get_db_path, init, run_migrations};
use tempfile::TempDir;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = diesel::sql_types::Text)]
    journal_mode: String,
}

#[test]
fn test_init_prepares_database_file_in_wal_mode() {
    let dir = TempDir::new().expect("create temp dir");
    let app_dir = dir.path().join("nested").join("data");

    let db_path = init(app_dir.to_str().unwrap()).expect("init database");
    assert!(std::path::Path::new(&db_path).exists());

    let pool = create_pool(&db_path).expect("create pool");
    run_migrations(&pool).expect("run migrations");

    // WAL is a property of the file; a fresh pooled connection must see it.
    let mut conn = get_connection(&pool).unwrap();
    let mode: JournalMode = sql_query("PRAGMA journal_mode").get_result(&mut conn).unwrap();
    assert_eq!(mode.journal_mode.to_lowercase(), "wal");
}

#[test]
fn test_database_url_overrides_default_path() {
    let dir = TempDir::new().expect("create temp dir");
    let app_dir = dir.path().to_str().unwrap();

    let default_path = get_db_path(app_dir);
    assert!(default_path.starts_with(app_dir));
    assert!(default_path.ends_with("listrack.db"));

    let override_path = dir.path().join("elsewhere.db");
    let override_str = override_path.to_str().unwrap();
    std::env::set_var("DATABASE_URL", override_str);
    let resolved = get_db_path(app_dir);
    std::env::remove_var("DATABASE_URL");

    assert_eq!(resolved, override_str);
}
