//! Active-record models
//!
//! Each model maps its fields to columns explicitly through [`Model::columns`]
//! and [`Model::from_record`]. Every provided operation is a single statement;
//! nothing here retries or wraps statements in a transaction.

pub mod project;
pub mod session;
pub mod user;
pub mod work_session;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{DbError, DbResult};
use super::query::{QueryBuilder, Record};
use super::Database;

pub use project::{Location, Project};
pub use session::Session;
pub use user::User;
pub use work_session::WorkSession;

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Timestamps {
    /// Fill in whichever timestamps are still unset
    pub fn stamp_created(&mut self, now: i64) {
        self.created_at.get_or_insert(now);
        self.updated_at.get_or_insert(now);
    }

    pub fn touch(&mut self, now: i64) {
        self.updated_at = Some(now);
    }

    pub(crate) fn columns(&self) -> [(&'static str, Value); 2] {
        [
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
        ]
    }

    pub(crate) fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            created_at: record.get("created_at")?,
            updated_at: record.get("updated_at")?,
        })
    }
}

#[async_trait]
pub trait Model: Sized + Send + Sync {
    const TABLE: &'static str;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// Column/value pairs persisted for this model, `id` excluded
    fn columns(&self) -> Vec<(&'static str, Value)>;

    fn from_record(record: &Record) -> DbResult<Self>;

    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        None
    }

    fn query() -> QueryBuilder {
        QueryBuilder::table(Self::TABLE)
    }

    fn from_records(records: &[Record]) -> DbResult<Vec<Self>> {
        records.iter().map(Self::from_record).collect()
    }

    async fn find(db: &Database, id: i64) -> DbResult<Option<Self>> {
        Self::find_by(db, "id", Value::Integer(id)).await
    }

    async fn find_by(db: &Database, field: &'static str, value: Value) -> DbResult<Option<Self>> {
        let record = Self::query().where_eq(field, value).first(db).await?;
        record.as_ref().map(Self::from_record).transpose()
    }

    /// Every row, in whatever order the store returns them
    async fn all(db: &Database) -> DbResult<Vec<Self>> {
        Self::from_records(&Self::query().get(db).await?)
    }

    /// Insert `data` and return it with its generated id
    async fn create(db: &Database, mut data: Self) -> DbResult<Self> {
        let conn = db.lock().await?;
        data.insert_on(&conn)?;
        Ok(data)
    }

    /// Insert when the model has no id yet, update every column otherwise
    async fn save(&mut self, db: &Database) -> DbResult<()> {
        let conn = db.lock().await?;
        match self.id() {
            None => self.insert_on(&conn).map(|_| ()),
            Some(_) => self.update_on(&conn),
        }
    }

    /// Apply `changes` in place, then persist the whole row
    async fn update<F>(&mut self, db: &Database, changes: F) -> DbResult<&mut Self>
    where
        F: FnOnce(&mut Self) + Send,
    {
        changes(self);
        let conn = db.lock().await?;
        self.update_on(&conn)?;
        Ok(self)
    }

    /// Returns whether a delete was issued
    async fn delete(&self, db: &Database) -> DbResult<bool> {
        match self.id() {
            Some(id) => {
                Self::query().delete(db, id).await?;
                debug!("Deleted {} row {}", Self::TABLE, id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn insert_on(&mut self, conn: &Connection) -> DbResult<i64> {
        if let Some(timestamps) = self.timestamps_mut() {
            timestamps.stamp_created(now_millis());
        }
        let id = Self::query().insert_on(conn, &self.columns())?;
        self.set_id(id);
        debug!("Created {} row {}", Self::TABLE, id);
        Ok(id)
    }

    fn update_on(&mut self, conn: &Connection) -> DbResult<()> {
        let id = self.id().ok_or(DbError::NotPersisted(Self::TABLE))?;
        if let Some(timestamps) = self.timestamps_mut() {
            timestamps.touch(now_millis());
        }
        if Self::query().update_on(conn, id, &self.columns())? == 0 {
            return Err(DbError::NotPersisted(Self::TABLE));
        }
        Ok(())
    }
}
