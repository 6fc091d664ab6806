//! Work session model, stored in `work_hours`

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::{Location, Model, Project, Timestamps, User};
use crate::db::error::DbResult;
use crate::db::query::Record;
use crate::db::{schema, Database};

const MILLIS_PER_MINUTE: i64 = 60_000;

pub const STARTED_PREFIX: &str = "Started - ";
pub const ENDED_MARKER: &str = " | Ended";
pub const SWITCHED_MARKER: &str = " | Switched";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkSession {
    pub id: Option<i64>,
    pub project_id: i64,
    pub user_id: i64,
    /// Epoch millis
    pub start_work_time: i64,
    /// Epoch millis, `None` while the session is running
    pub end_work_time: Option<i64>,
    /// Minutes
    pub break_time: i64,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl WorkSession {
    /// A running session started at `start` from `location`
    pub fn start(project_id: i64, user_id: i64, location: Location, start: i64) -> Self {
        Self {
            id: None,
            project_id,
            user_id,
            start_work_time: start,
            end_work_time: None,
            break_time: 0,
            notes: Some(format!("{}{}", STARTED_PREFIX, location)),
            timestamps: Timestamps::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_work_time.is_none()
    }

    /// Worked milliseconds with the break deducted; 0 while running.
    pub fn duration(&self) -> i64 {
        match self.end_work_time {
            Some(end) => (end - self.start_work_time - self.break_time * MILLIS_PER_MINUTE).max(0),
            None => 0,
        }
    }

    /// Location recorded in the notes when the session was started
    pub fn location(&self) -> Option<Location> {
        let notes = self.notes.as_deref()?;
        let (_, rest) = notes.split_once(" - ")?;
        let location = rest.split(" | ").next()?;
        location.parse().ok()
    }

    /// Close the session in memory. `marker` is appended to the notes.
    pub fn finish(&mut self, end: i64, marker: &str) {
        self.end_work_time = Some(end);
        self.notes = Some(format!("{}{}", self.notes.as_deref().unwrap_or_default(), marker));
    }

    /// The running session for `user_id`, if any
    pub async fn active_for(db: &Database, user_id: i64) -> DbResult<Option<Self>> {
        let record = Self::query()
            .where_eq("user_id", user_id)
            .where_null("end_work_time")
            .first(db)
            .await?;
        record.as_ref().map(Self::from_record).transpose()
    }

    pub async fn project(&self, db: &Database) -> DbResult<Option<Project>> {
        Project::find(db, self.project_id).await
    }

    pub async fn user(&self, db: &Database) -> DbResult<Option<User>> {
        User::find(db, self.user_id).await
    }
}

impl Model for WorkSession {
    const TABLE: &'static str = schema::WORK_HOURS;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = vec![
            ("project_id", Value::Integer(self.project_id)),
            ("user_id", Value::Integer(self.user_id)),
            ("start_work_time", Value::Integer(self.start_work_time)),
            ("end_work_time", self.end_work_time.into()),
            ("break_time", Value::Integer(self.break_time)),
            ("notes", self.notes.clone().into()),
        ];
        columns.extend(self.timestamps.columns());
        columns
    }

    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            project_id: record.get("project_id")?,
            user_id: record.get("user_id")?,
            start_work_time: record.get("start_work_time")?,
            end_work_time: record.get("end_work_time")?,
            break_time: record.get::<Option<i64>>("break_time")?.unwrap_or(0),
            notes: record.get("notes")?,
            timestamps: Timestamps::from_record(record)?,
        })
    }

    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        Some(&mut self.timestamps)
    }
}
