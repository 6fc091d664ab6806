// Tests for the migration registry and runner

use worklog::db::{
    Database, DbError, Migration, MigrationRunner, MigrationStatus, MIGRATIONS,
};
use tempfile::TempDir;

fn create_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(temp_dir.path().join("test.db"));
    (db, temp_dir)
}

async fn table_exists(db: &Database, name: &str) -> bool {
    let conn = db.lock().await.unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

async fn index_exists(db: &Database, name: &str) -> bool {
    let conn = db.lock().await.unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .unwrap();
    count > 0
}

const CREATE_A: Migration = Migration {
    version: 1,
    name: "create_a",
    up: "CREATE TABLE a (id INTEGER PRIMARY KEY);",
    down: "DROP TABLE a;",
};

const CREATE_B_REFERENCING_A: Migration = Migration {
    version: 2,
    name: "create_b",
    up: "CREATE TABLE b (id INTEGER PRIMARY KEY, a_id INTEGER REFERENCES a(id));
         INSERT INTO a (id) VALUES (1);
         INSERT INTO b (a_id) VALUES (1);",
    down: "DROP TABLE b;",
};

#[tokio::test]
async fn test_run_applies_registry() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db.clone());

    assert_eq!(runner.latest_version().await.unwrap(), 0);
    assert_eq!(runner.run().await.unwrap(), 3);

    for table in ["users", "projects", "work_hours", "session", "migrations"] {
        assert!(table_exists(&db, table).await, "{} missing", table);
    }
    assert!(index_exists(&db, "idx_work_hours_one_active").await);

    let applied = runner.applied().await.unwrap();
    let versions: Vec<i64> = applied.iter().map(|m| m.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert!(applied.iter().all(|m| m.status == MigrationStatus::Applied));
    assert_eq!(applied[0].name, "create_initial_tables");
    assert_eq!(runner.latest_version().await.unwrap(), 3);
}

#[tokio::test]
async fn test_run_is_idempotent() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db.clone());

    runner.run().await.unwrap();
    let first = runner.applied().await.unwrap();

    assert_eq!(runner.run().await.unwrap(), 0);
    let second = runner.applied().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_status_reports_pending_then_applied() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db);

    let before = runner.status().await.unwrap();
    assert_eq!(before.len(), 3);
    assert!(before.iter().all(|s| s.status == MigrationStatus::Pending));
    assert!(before.iter().all(|s| s.applied_at.is_none()));

    runner.run().await.unwrap();

    let after = runner.status().await.unwrap();
    assert!(after.iter().all(|s| s.status == MigrationStatus::Applied));
    assert!(after.iter().all(|s| s.applied_at.is_some()));
}

#[tokio::test]
async fn test_registry_order_is_by_version() {
    let (db, _temp) = create_test_db();
    // Version 2 needs version 1's table; hand them over backwards
    let runner =
        MigrationRunner::with_registry(db.clone(), vec![CREATE_B_REFERENCING_A, CREATE_A]);

    assert_eq!(runner.run().await.unwrap(), 2);
    assert!(table_exists(&db, "b").await);
}

#[tokio::test]
async fn test_failing_migration_stops_the_run() {
    let (db, _temp) = create_test_db();
    let broken = Migration {
        version: 2,
        name: "broken",
        up: "CREATE TABLE half (id INTEGER); THIS IS NOT SQL;",
        down: "",
    };
    let later = Migration {
        version: 3,
        name: "later",
        up: "CREATE TABLE later (id INTEGER);",
        down: "DROP TABLE later;",
    };
    let runner = MigrationRunner::with_registry(db.clone(), vec![CREATE_A, broken, later]);

    let err = runner.run().await.unwrap_err();
    assert!(matches!(err, DbError::Migration { version: 2, .. }));

    let versions: Vec<i64> = runner
        .applied()
        .await
        .unwrap()
        .iter()
        .map(|m| m.version)
        .collect();
    assert_eq!(versions, vec![1]);
    assert!(table_exists(&db, "a").await);
    assert!(!table_exists(&db, "half").await);
    assert!(!table_exists(&db, "later").await);
}

#[tokio::test]
async fn test_invalid_registry_is_rejected_before_running() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::with_registry(db.clone(), vec![CREATE_A, CREATE_A]);

    assert!(matches!(
        runner.run().await,
        Err(DbError::InvalidRegistry(_))
    ));
    assert!(!table_exists(&db, "a").await);
}

#[tokio::test]
async fn test_downgrade_to_zero_drops_schema() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db.clone());
    runner.run().await.unwrap();

    assert_eq!(runner.downgrade_to(0).await.unwrap(), 3);

    for table in ["users", "projects", "work_hours", "session"] {
        assert!(!table_exists(&db, table).await, "{} still exists", table);
    }
    assert!(table_exists(&db, "migrations").await);
    assert!(runner.applied().await.unwrap().is_empty());
    assert_eq!(runner.latest_version().await.unwrap(), 0);
}

#[tokio::test]
async fn test_partial_downgrade_and_reapply() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db.clone());
    runner.run().await.unwrap();

    assert_eq!(runner.downgrade_to(2).await.unwrap(), 1);
    assert!(!index_exists(&db, "idx_work_hours_one_active").await);
    assert!(table_exists(&db, "work_hours").await);
    assert_eq!(runner.latest_version().await.unwrap(), 2);

    assert_eq!(runner.run().await.unwrap(), 1);
    assert!(index_exists(&db, "idx_work_hours_one_active").await);
}

#[tokio::test]
async fn test_downgrade_refuses_unknown_versions() {
    let (db, _temp) = create_test_db();
    let runner = MigrationRunner::new(db.clone());
    runner.run().await.unwrap();
    {
        let conn = db.lock().await.unwrap();
        conn.execute(
            "INSERT INTO migrations (version, name, applied_at) VALUES (99, 'from_the_future', 0)",
            [],
        )
        .unwrap();
    }

    assert!(matches!(
        runner.downgrade_to(0).await,
        Err(DbError::UnknownMigration(99))
    ));
    // Nothing below the unknown version was touched
    assert!(table_exists(&db, "users").await);
}

#[tokio::test]
async fn test_tracking_migration_backfills_unrecorded_initial_tables() {
    let (db, _temp) = create_test_db();

    // A store whose tables were created before the ledger recorded them
    {
        let conn = db.lock().await.unwrap();
        conn.execute_batch(MIGRATIONS[0].up).unwrap();
    }

    let runner = MigrationRunner::with_registry(db.clone(), vec![MIGRATIONS[1]]);
    assert_eq!(runner.run().await.unwrap(), 1);

    let versions: Vec<i64> = runner
        .applied()
        .await
        .unwrap()
        .iter()
        .map(|m| m.version)
        .collect();
    assert_eq!(versions, vec![1, 2]);

    // The full registry now only has the index migration left
    assert_eq!(MigrationRunner::new(db.clone()).run().await.unwrap(), 1);
}
