//! End-to-end migration tests against a real SQLite database.

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use rudder::migrate::{
    create_migration, dialect_by_name, Direction, MigrationDatabase, MigrationEngine,
    MigrationError, Statement, Track, UpgradeOutcome,
};
use rudder_sqlite::SqliteConnection;
use tempfile::TempDir;

const V1: i64 = 20240101000000;
const V2: i64 = 20240102000000;
const V3: i64 = 20240103000000;

fn write(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

fn annotated(up: &str, down: &str) -> String {
    format!("-- +rudder Up\n{}\n\n-- +rudder Down\n{}\n", up, down)
}

/// A migrations root with users and posts migrations on the default track.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("migrations");
    write(
        &root,
        "20240101000000_create_users.sql",
        &annotated(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\nINSERT INTO users (name) VALUES ('admin');",
            "DROP TABLE users;",
        ),
    );
    write(
        &root,
        "20240102000000_create_posts.up.sql",
        "CREATE TABLE posts (\n  id INTEGER PRIMARY KEY,\n  user_id INTEGER NOT NULL REFERENCES users (id)\n);\n",
    );
    write(&root, "20240102000000_create_posts.down.sql", "DROP TABLE posts;\n");
    dir
}

async fn engine(dir: &TempDir, track: &str) -> MigrationEngine<SqliteConnection> {
    let db_path = dir.path().join("app.sqlite3");
    let db = SqliteConnection::connect(&db_path.display().to_string()).await.unwrap();
    MigrationEngine::new(
        db,
        dialect_by_name("sqlite3").unwrap(),
        dir.path().join("migrations"),
        Track::new(track).unwrap(),
    )
}

async fn table_exists<D: MigrationDatabase>(db: &mut D, name: &str) -> bool {
    let stmt = Statement::with_params(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        vec![name.into()],
    );
    db.query_count(&stmt).await.unwrap() == 1
}

#[tokio::test]
async fn test_up_applies_annotated_and_split_migrations() {
    let dir = project();
    let mut engine = engine(&dir, "").await;

    let report = engine.up().await.unwrap();
    assert_eq!(report.from, 0);
    assert_eq!(report.to, V2);
    assert_eq!(
        report.steps.iter().map(|s| (s.version, s.direction, s.statements)).collect::<Vec<_>>(),
        vec![(V1, Direction::Up, 2), (V2, Direction::Up, 1)]
    );

    assert!(table_exists(engine.database(), "users").await);
    assert!(table_exists(engine.database(), "posts").await);
    assert_eq!(engine.current_version().await.unwrap(), V2);

    // Running again is a no-op.
    assert!(engine.up().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_down_and_redo() {
    let dir = project();
    let mut engine = engine(&dir, "").await;
    engine.up().await.unwrap();

    let report = engine.down().await.unwrap();
    assert_eq!(report.to, V1);
    assert!(!table_exists(engine.database(), "posts").await);
    assert!(table_exists(engine.database(), "users").await);

    let report = engine.redo().await.unwrap();
    assert_eq!(
        report.steps.iter().map(|s| (s.version, s.direction)).collect::<Vec<_>>(),
        vec![(V1, Direction::Down), (V1, Direction::Up)]
    );
    assert_eq!(engine.current_version().await.unwrap(), V1);
}

#[tokio::test]
async fn test_down_all_and_resume() {
    let dir = project();
    let mut engine = engine(&dir, "").await;
    engine.up().await.unwrap();

    let report = engine.down_all().await.unwrap();
    assert_eq!(report.to, 0);
    assert_eq!(report.steps.len(), 2);
    assert!(!table_exists(engine.database(), "users").await);

    // A second run has nothing left to do.
    assert!(engine.down_all().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_failed_step_rolls_back_script_and_bookkeeping() {
    let dir = project();
    write(
        &dir.path().join("migrations"),
        "20240103000000_broken.sql",
        &annotated("CREATE TABLE audit (id INTEGER);\nINSERT INTO missing_table VALUES (1);", "DROP TABLE audit;"),
    );

    let mut engine = engine(&dir, "").await;
    let err = engine.up().await.unwrap_err();
    assert!(matches!(err, MigrationError::Execution { version: V3, .. }));

    // Earlier steps stay committed; the failing one left nothing behind.
    assert_eq!(engine.current_version().await.unwrap(), V2);
    assert!(!table_exists(engine.database(), "audit").await);

    let status = engine.status().await.unwrap();
    assert_eq!(status.pending().map(|m| m.version).collect::<Vec<_>>(), vec![V3]);
}

#[tokio::test]
async fn test_statement_block_trigger() {
    let dir = project();
    write(
        &dir.path().join("migrations"),
        "20240103000000_touch_trigger.sql",
        r#"-- +rudder Up
ALTER TABLE users ADD COLUMN updated_at TEXT;

-- +rudder StatementBegin
CREATE TRIGGER users_touch AFTER UPDATE OF name ON users
BEGIN
    UPDATE users SET updated_at = datetime('now') WHERE id = NEW.id;
END;
-- +rudder StatementEnd

-- +rudder Down
DROP TRIGGER users_touch;
"#,
    );

    let mut engine = engine(&dir, "").await;
    let report = engine.up().await.unwrap();
    assert_eq!(report.steps.last().map(|s| s.statements), Some(2));

    let triggers = Statement::raw("SELECT COUNT(*) FROM sqlite_master WHERE type = 'trigger'");
    assert_eq!(engine.database().query_count(&triggers).await.unwrap(), 1);
}

#[tokio::test]
async fn test_tracks_share_table_but_not_history() {
    let dir = project();
    write(
        &dir.path().join("migrations").join("billing"),
        "20240301000000_create_invoices.sql",
        &annotated("CREATE TABLE invoices (id INTEGER PRIMARY KEY);", "DROP TABLE invoices;"),
    );

    let mut default = engine(&dir, "").await;
    default.up().await.unwrap();
    drop(default);

    let mut billing = engine(&dir, "billing").await;
    assert_eq!(billing.current_version().await.unwrap(), 0);
    let report = billing.up().await.unwrap();
    assert_eq!(report.to, 20240301000000);
    drop(billing);

    let mut default = engine(&dir, "").await;
    assert_eq!(default.current_version().await.unwrap(), V2);
}

#[tokio::test]
async fn test_status_reports_timestamps() {
    let dir = project();
    let mut engine = engine(&dir, "").await;
    engine.run_migrations(V1).await.unwrap();

    let status = engine.status().await.unwrap();
    assert_eq!(status.current_version, V1);
    assert_eq!(status.migrations.len(), 2);
    assert!(status.migrations[0].applied);
    assert!(status.migrations[0].recorded_at.is_some());
    assert!(!status.migrations[1].applied);
    assert_eq!(status.migrations[1].file.as_deref(), Some("20240102000000_create_posts.up.sql"));
}

#[tokio::test]
async fn test_move_migration_between_tracks() {
    let dir = project();
    let mut default = engine(&dir, "").await;
    default.up().await.unwrap();
    drop(default);

    let mut posts = engine(&dir, "posts").await;
    let moved = posts.move_migration("20240102000000_create_posts.up.sql").await.unwrap();
    assert_eq!(moved.version, V2);
    assert!(moved.to.ends_with("posts/20240102000000_create_posts.up.sql"));
    assert_eq!(posts.current_version().await.unwrap(), V2);
    drop(posts);

    let mut default = engine(&dir, "").await;
    assert_eq!(default.current_version().await.unwrap(), V1);
}

#[tokio::test]
async fn test_move_migration_before_first_use() {
    let dir = project();
    let mut posts = engine(&dir, "posts").await;
    let moved = posts.move_migration("20240101000000_create_users.sql").await.unwrap();

    assert_eq!(moved.version, V1);
    assert!(dir.path().join("migrations/posts/20240101000000_create_users.sql").exists());
    assert!(!dir.path().join("migrations/20240101000000_create_users.sql").exists());
    assert!(table_exists(posts.database(), "rudder_db_version").await);
    assert_eq!(posts.current_version().await.unwrap(), 0);
    drop(posts);

    let mut default = engine(&dir, "").await;
    assert_eq!(default.current_version().await.unwrap(), 0);
}

#[tokio::test]
async fn test_created_migration_applies_right_away() {
    let dir = project();
    let migrations = dir.path().join("migrations");
    let when = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let path = create_migration(&migrations, "add tags", when).await.unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("-- +rudder Up"));

    let mut default = engine(&dir, "").await;
    let report = default.up().await.unwrap();
    assert_eq!(report.steps.len(), 3);
    assert_eq!(default.current_version().await.unwrap(), 20240201000000);
}

#[tokio::test]
async fn test_upgrade_legacy_bookkeeping_table() {
    let dir = project();
    let db_path = dir.path().join("app.sqlite3");
    let legacy = SqliteConnection::connect(&db_path.display().to_string()).await.unwrap();
    legacy
        .execute_batch(
            "CREATE TABLE rudder_db_version (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                version_id INTEGER NOT NULL,
                is_applied INTEGER NOT NULL,
                tstamp TIMESTAMP DEFAULT (datetime('now'))
            );
            INSERT INTO rudder_db_version (version_id, is_applied) VALUES (0, 1);
            INSERT INTO rudder_db_version (version_id, is_applied) VALUES (20240101000000, 1);",
        )
        .await
        .unwrap();
    legacy.close().await.unwrap();

    let mut engine = engine(&dir, "legacy").await;
    assert_eq!(
        engine.upgrade_bookkeeping_schema().await.unwrap(),
        UpgradeOutcome::Upgraded {
            track: Track::new("legacy").unwrap()
        }
    );
    assert_eq!(engine.current_version().await.unwrap(), V1);
    assert_eq!(
        engine.upgrade_bookkeeping_schema().await.unwrap(),
        UpgradeOutcome::AlreadyUpgraded
    );
}

#[tokio::test]
async fn test_missing_file_blocks_rollback() {
    let dir = project();
    let mut engine = engine(&dir, "").await;
    engine.up().await.unwrap();

    let root = dir.path().join("migrations");
    fs::remove_file(root.join("20240102000000_create_posts.up.sql")).unwrap();
    fs::remove_file(root.join("20240102000000_create_posts.down.sql")).unwrap();

    let err = engine.down().await.unwrap_err();
    assert!(matches!(err, MigrationError::MissingMigration(V2)));
    assert!(table_exists(engine.database(), "posts").await);
}
