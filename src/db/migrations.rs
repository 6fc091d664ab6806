//! Versioned schema migrations
//!
//! The `migrations` ledger is the only record of which schema versions exist
//! in a store. Forward scripts run in ascending version order; a failure stops
//! the run and leaves earlier versions recorded.

use std::collections::BTreeSet;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{DbError, DbResult};
use super::models::now_millis;
use super::schema;
use super::Database;

/// A schema change with its forward and backward SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_initial_tables",
        up: schema::CREATE_INITIAL_TABLES_UP,
        down: schema::CREATE_INITIAL_TABLES_DOWN,
    },
    Migration {
        version: 2,
        name: "create_migration_tracking",
        up: schema::CREATE_MIGRATION_TRACKING_UP,
        down: schema::CREATE_MIGRATION_TRACKING_DOWN,
    },
    Migration {
        version: 3,
        name: "single_active_work_session",
        up: schema::SINGLE_ACTIVE_WORK_SESSION_UP,
        down: schema::SINGLE_ACTIVE_WORK_SESSION_DOWN,
    },
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Applied,
    Pending,
    Failed,
}

impl MigrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStatus::Applied => "applied",
            MigrationStatus::Pending => "pending",
            MigrationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(MigrationStatus::Applied),
            "pending" => Some(MigrationStatus::Pending),
            "failed" => Some(MigrationStatus::Failed),
            _ => None,
        }
    }
}

/// A row of the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedMigration {
    pub id: i64,
    pub version: i64,
    pub name: String,
    pub applied_at: i64,
    pub status: MigrationStatus,
}

/// A registry entry together with its ledger state
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationState {
    pub version: i64,
    pub name: &'static str,
    pub status: MigrationStatus,
    pub applied_at: Option<i64>,
}

pub struct MigrationRunner {
    db: Database,
    registry: Vec<Migration>,
}

impl MigrationRunner {
    pub fn new(db: Database) -> Self {
        Self::with_registry(db, MIGRATIONS.to_vec())
    }

    /// Use a custom registry. Entries are sorted by version here, so the
    /// order they are passed in does not matter.
    pub fn with_registry(db: Database, mut registry: Vec<Migration>) -> Self {
        registry.sort_by_key(|m| m.version);
        Self { db, registry }
    }

    pub fn registry(&self) -> &[Migration] {
        &self.registry
    }

    /// Create the ledger table if needed
    pub async fn ensure_ledger(&self) -> DbResult<()> {
        let conn = self.db.lock().await?;
        conn.execute_batch(schema::LEDGER)?;
        Ok(())
    }

    /// Ledger rows ordered by version
    pub async fn applied(&self) -> DbResult<Vec<AppliedMigration>> {
        let conn = self.db.lock().await?;
        conn.execute_batch(schema::LEDGER)?;
        read_ledger(&conn)
    }

    /// Highest applied version, 0 for an empty ledger
    pub async fn latest_version(&self) -> DbResult<i64> {
        let conn = self.db.lock().await?;
        conn.execute_batch(schema::LEDGER)?;
        let latest: Option<i64> =
            conn.query_row("SELECT MAX(version) FROM migrations", [], |row| row.get(0))?;
        Ok(latest.unwrap_or(0))
    }

    pub async fn status(&self) -> DbResult<Vec<MigrationState>> {
        let applied = self.applied().await?;
        Ok(self
            .registry
            .iter()
            .map(|m| {
                let row = applied.iter().find(|a| a.version == m.version);
                MigrationState {
                    version: m.version,
                    name: m.name,
                    status: row.map_or(MigrationStatus::Pending, |a| a.status),
                    applied_at: row.map(|a| a.applied_at),
                }
            })
            .collect())
    }

    /// Apply every pending migration in version order.
    ///
    /// Returns how many were applied; 0 means the store was already current.
    pub async fn run(&self) -> DbResult<usize> {
        validate_registry(&self.registry)?;

        let mut conn = self.db.lock().await?;
        conn.execute_batch(schema::LEDGER)?;

        let applied: BTreeSet<i64> = read_ledger(&conn)?.iter().map(|m| m.version).collect();

        let mut count = 0;
        for migration in self.registry.iter().filter(|m| !applied.contains(&m.version)) {
            info!("Running migration {}_{}", migration.version, migration.name);
            apply(&mut conn, migration).map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name.to_string(),
                source,
            })?;
            count += 1;
        }

        if count == 0 {
            debug!("No pending migrations");
        } else {
            info!("{} migrations applied", count);
        }
        Ok(count)
    }

    /// Reverse every applied migration newer than `target`, newest first.
    ///
    /// Returns how many were reversed.
    pub async fn downgrade_to(&self, target: i64) -> DbResult<usize> {
        let mut conn = self.db.lock().await?;
        conn.execute_batch(schema::LEDGER)?;

        let mut to_reverse: Vec<AppliedMigration> = read_ledger(&conn)?
            .into_iter()
            .filter(|m| m.version > target)
            .collect();
        to_reverse.sort_by(|a, b| b.version.cmp(&a.version));

        let mut count = 0;
        for applied in &to_reverse {
            let migration = self
                .registry
                .iter()
                .find(|m| m.version == applied.version)
                .ok_or(DbError::UnknownMigration(applied.version))?;

            info!("Reversing migration {}_{}", migration.version, migration.name);
            revert(&mut conn, migration).map_err(|source| DbError::Migration {
                version: migration.version,
                name: migration.name.to_string(),
                source,
            })?;
            count += 1;
        }

        info!("Downgraded to version {}", target);
        Ok(count)
    }
}

/// Versions must be positive and unique
pub fn validate_registry(registry: &[Migration]) -> DbResult<()> {
    let mut seen = BTreeSet::new();
    for m in registry {
        if m.version <= 0 {
            return Err(DbError::InvalidRegistry(format!(
                "migration '{}' has non-positive version {}",
                m.name, m.version
            )));
        }
        if !seen.insert(m.version) {
            return Err(DbError::InvalidRegistry(format!(
                "version {} is registered more than once",
                m.version
            )));
        }
    }
    Ok(())
}

fn apply(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.up)?;
    tx.execute(
        "INSERT INTO migrations (version, name, applied_at, status) VALUES (?1, ?2, ?3, ?4)",
        params![
            migration.version,
            migration.name,
            now_millis(),
            MigrationStatus::Applied.as_str()
        ],
    )?;
    tx.commit()
}

fn revert(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    if !migration.down.trim().is_empty() {
        tx.execute_batch(migration.down)?;
    }
    tx.execute(
        "DELETE FROM migrations WHERE version = ?1",
        params![migration.version],
    )?;
    tx.commit()
}

fn read_ledger(conn: &Connection) -> DbResult<Vec<AppliedMigration>> {
    let mut stmt = conn.prepare(
        "SELECT id, version, name, applied_at, status FROM migrations ORDER BY version ASC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let status: String = row.get(4)?;
            Ok(AppliedMigration {
                id: row.get(0)?,
                version: row.get(1)?,
                name: row.get(2)?,
                applied_at: row.get(3)?,
                status: MigrationStatus::parse(&status).unwrap_or(MigrationStatus::Failed),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
