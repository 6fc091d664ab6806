//! Signed-in session, a single row with id 1

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{now_millis, Model, User};
use crate::db::error::{DbError, DbResult};
use crate::db::query::Record;
use crate::db::{schema, Database};

pub const SESSION_ID: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: Option<i64>,
    pub user_id: i64,
    pub signed_in_at: i64,
    pub last_activity: i64,
}

impl Session {
    pub async fn current(db: &Database) -> DbResult<Option<Self>> {
        Self::find(db, SESSION_ID).await
    }

    /// Sign `user_id` in, replacing whoever was signed in before.
    ///
    /// The row is looked up first and then updated or inserted; inserting
    /// blindly would trip the `id = 1` CHECK on the second sign-in.
    pub async fn set_current(db: &Database, user_id: i64) -> DbResult<Self> {
        let now = now_millis();
        let conn = db.lock().await?;

        let existing = Self::query().where_eq("id", SESSION_ID).first_on(&conn)?;
        let data = [
            ("user_id", Value::Integer(user_id)),
            ("signed_in_at", Value::Integer(now)),
            ("last_activity", Value::Integer(now)),
        ];

        if existing.is_some() {
            Self::query().update_on(&conn, SESSION_ID, &data)?;
            info!("Session updated for user {}", user_id);
        } else {
            let mut row = vec![("id", Value::Integer(SESSION_ID))];
            row.extend(data);
            Self::query().insert_on(&conn, &row)?;
            info!("Session created for user {}", user_id);
        }

        Ok(Self {
            id: Some(SESSION_ID),
            user_id,
            signed_in_at: now,
            last_activity: now,
        })
    }

    /// Sign out. Clearing an empty session is not an error.
    pub async fn clear(db: &Database) -> DbResult<bool> {
        let conn = db.lock().await?;
        let existing = Self::query().where_eq("id", SESSION_ID).first_on(&conn)?;
        if existing.is_none() {
            return Ok(false);
        }
        Self::query().delete_on(&conn, SESSION_ID)?;
        info!("Session cleared");
        Ok(true)
    }

    /// Refresh `last_activity`; `signed_in_at` is left alone
    pub async fn update_activity(&mut self, db: &Database) -> DbResult<()> {
        let now = now_millis();
        let changed = Self::query()
            .update(db, SESSION_ID, &[("last_activity", Value::Integer(now))])
            .await?;
        if changed == 0 {
            return Err(DbError::NotPersisted(schema::SESSION));
        }
        self.last_activity = now;
        Ok(())
    }

    pub async fn user(&self, db: &Database) -> DbResult<Option<User>> {
        User::find(db, self.user_id).await
    }
}

impl Model for Session {
    const TABLE: &'static str = schema::SESSION;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("user_id", Value::Integer(self.user_id)),
            ("signed_in_at", Value::Integer(self.signed_in_at)),
            ("last_activity", Value::Integer(self.last_activity)),
        ]
    }

    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            user_id: record.get("user_id")?,
            signed_in_at: record.get("signed_in_at")?,
            last_activity: record.get("last_activity")?,
        })
    }
}
