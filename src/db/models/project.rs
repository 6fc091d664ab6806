//! Project model

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::{Model, Timestamps, WorkSession};
use crate::db::error::{DbError, DbResult};
use crate::db::query::{Direction, Record};
use crate::db::{schema, Database};

/// Where work happens. Stored as the integer code the `projects.location`
/// CHECK constraint allows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Location {
    Home,
    Office,
    Client,
}

impl Location {
    pub const ALL: [Location; 3] = [Location::Home, Location::Office, Location::Client];

    pub fn code(&self) -> i64 {
        match self {
            Location::Home => 1,
            Location::Office => 2,
            Location::Client => 3,
        }
    }

    pub fn from_code(code: i64) -> DbResult<Self> {
        match code {
            1 => Ok(Location::Home),
            2 => Ok(Location::Office),
            3 => Ok(Location::Client),
            other => Err(DbError::InvalidLocation(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Home => "HOME",
            Location::Office => "OFFICE",
            Location::Client => "CLIENT",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = String;

    /// Case-insensitive; "work" is an alias for the office
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "home" | "1" => Ok(Location::Home),
            "office" | "work" | "2" => Ok(Location::Office),
            "client" | "3" => Ok(Location::Client),
            _ => Err(format!("Unknown location: {}", s)),
        }
    }
}

impl TryFrom<String> for Location {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    pub id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub location: Location,
    pub is_active: bool,
    #[serde(flatten)]
    pub timestamps: Timestamps,
}

impl Project {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            location,
            is_active: true,
            timestamps: Timestamps::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Active projects ordered by name
    pub async fn active(db: &Database) -> DbResult<Vec<Self>> {
        let records = Self::query()
            .where_eq("is_active", 1)
            .order_by("name", Direction::Asc)
            .get(db)
            .await?;
        Self::from_records(&records)
    }

    /// Active projects at `location`, ordered by name
    pub async fn by_location(db: &Database, location: Location) -> DbResult<Vec<Self>> {
        let records = Self::query()
            .where_eq("location", location.code())
            .where_eq("is_active", 1)
            .order_by("name", Direction::Asc)
            .get(db)
            .await?;
        Self::from_records(&records)
    }

    /// Work sessions logged against this project, newest first
    pub async fn work_sessions(&self, db: &Database) -> DbResult<Vec<WorkSession>> {
        let id = self.id.ok_or(DbError::NotPersisted(schema::PROJECTS))?;
        let records = WorkSession::query()
            .where_eq("project_id", id)
            .order_by("start_work_time", Direction::Desc)
            .get(db)
            .await?;
        WorkSession::from_records(&records)
    }
}

impl Model for Project {
    const TABLE: &'static str = schema::PROJECTS;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = vec![
            ("name", Value::Text(self.name.clone())),
            ("description", self.description.clone().into()),
            ("location", Value::Integer(self.location.code())),
            ("is_active", Value::from(self.is_active)),
        ];
        columns.extend(self.timestamps.columns());
        columns
    }

    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            id: record.get("id")?,
            name: record.get("name")?,
            description: record.get("description")?,
            location: Location::from_code(record.get("location")?)?,
            is_active: record.get::<Option<bool>>("is_active")?.unwrap_or(true),
            timestamps: Timestamps::from_record(record)?,
        })
    }

    fn timestamps_mut(&mut self) -> Option<&mut Timestamps> {
        Some(&mut self.timestamps)
    }
}
