//! User model

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::{Model, Timestamps, WorkSession};
use crate::db::error::{DbError, DbResult};
use crate::db::query::{Direction, Record};
use crate::db::{schema, Database};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub hms_user: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl User {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone_number: None,
            hms_user: None,
            timestamps: Timestamps::default(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub async fn find_by_email(db: &Database, email: &str) -> DbResult<Option<Self>> {
        Self::find_by(db, "email", Value::Text(email.to_string())).await
    }

    /// This user's work sessions, newest first
    pub async fn work_sessions(&self, db: &Database) -> DbResult<Vec<WorkSession>> {
        let id = self.id.ok_or(DbError::NotPersisted(schema::USERS))?;
        let records = WorkSession::query()
            .where_eq("user_id", id)
            .order_by("start_work_time", Direction::Desc)
            .get(db)
            .await?;
        WorkSession::from_records(&records)
    }
}

impl Model for User {
    const TABLE: &'static str = schema::USERS;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = vec![
            ("first_name", Value::Text(self.first_name.clone())),
            ("last_name", Value::Text(self.last_name.clone())),
            ("email", Value::Text(self.email.clone())),
            ("phone_number", self.phone_number.clone().into()),
            ("hms_user", self.hms_user.clone().into()),
        ];
        columns.extend(self.timestamps.columns());
        columns
    }

    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            first_name: record.get("first_name")?,
            last_name: record.get("last_name")?,
            email: record.get("email")?,
            phone_number: record.get("phone_number")?,
            hms_user: record.get("hms_user")?,
            timestamps: Timestamps::from_record(record)?,
        })
    }

    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        Some(&mut self.timestamps)
    }
}
