//! Work hours repository
//!
//! Start, end and switch each run inside one transaction on the shared
//! connection. The active-session check and the write that depends on it
//! can therefore not interleave with another caller, and a switch never
//! leaves two running sessions behind.

use chrono::{Local, NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::info;

use crate::db::error::{DbError, DbResult};
use crate::db::models::work_session::{ENDED_MARKER, SWITCHED_MARKER};
use crate::db::models::{Location, Model, WorkSession};
use crate::db::query::{select_records, Record};
use crate::db::Database;

/// A work session joined with its project
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkEntry {
    #[serde(flatten)]
    pub session: WorkSession,
    pub project_name: String,
    pub project_location: Location,
}

impl WorkEntry {
    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(Self {
            session: WorkSession::from_record(record)?,
            project_name: record.get("project_name")?,
            project_location: Location::from_code(record.get("project_location")?)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub entries: Vec<WorkEntry>,
    /// Worked milliseconds across finished sessions
    pub total_millis: i64,
}

impl DailyReport {
    pub fn active(&self) -> Option<&WorkEntry> {
        self.entries.iter().find(|e| e.session.is_active())
    }
}

pub struct WorkHoursRepository {
    db: Database,
}

impl WorkHoursRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Start a session for `user_id`. Fails if one is already running.
    pub async fn start(
        &self,
        project_id: i64,
        user_id: i64,
        location: Location,
        at: i64,
    ) -> DbResult<WorkSession> {
        let mut conn = self.db.lock().await?;
        let tx = conn.transaction()?;

        if let Some(active) = active_on(&tx, user_id)? {
            return Err(DbError::ActiveSessionExists {
                user_id,
                session_id: active.id.unwrap_or_default(),
            });
        }

        let mut session = WorkSession::start(project_id, user_id, location, at);
        session.insert_on(&tx)?;
        tx.commit()?;

        info!("User {} started work on project {} at {}", user_id, project_id, location);
        Ok(session)
    }

    /// End the running session. Returns `None` when nothing was running.
    pub async fn end(
        &self,
        user_id: i64,
        at: i64,
        break_minutes: Option<i64>,
    ) -> DbResult<Option<WorkSession>> {
        let mut conn = self.db.lock().await?;
        let tx = conn.transaction()?;

        if let Some(minutes) = break_minutes.filter(|m| *m < 0) {
            return Err(DbError::NegativeBreak(minutes));
        }

        let Some(mut session) = active_on(&tx, user_id)? else {
            return Ok(None);
        };
        check_end(&session, at)?;
        session.finish(at, ENDED_MARKER);
        if let Some(minutes) = break_minutes {
            session.break_time = minutes;
        }
        session.update_on(&tx)?;
        tx.commit()?;

        info!("User {} ended work session {:?}", user_id, session.id);
        Ok(Some(session))
    }

    /// End whatever is running and start a new session at the same instant.
    ///
    /// The old session is closed before the new one is inserted, and both
    /// writes commit together.
    pub async fn switch(
        &self,
        user_id: i64,
        project_id: i64,
        location: Location,
        at: i64,
    ) -> DbResult<(Option<WorkSession>, WorkSession)> {
        let mut conn = self.db.lock().await?;
        let tx = conn.transaction()?;

        let ended = match active_on(&tx, user_id)? {
            Some(mut previous) => {
                check_end(&previous, at)?;
                previous.finish(at, SWITCHED_MARKER);
                previous.update_on(&tx)?;
                Some(previous)
            }
            None => None,
        };

        let mut started = WorkSession::start(project_id, user_id, location, at);
        started.insert_on(&tx)?;
        tx.commit()?;

        info!("User {} switched to project {} at {}", user_id, project_id, location);
        Ok((ended, started))
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<WorkSession>> {
        WorkSession::find(&self.db, id).await
    }

    pub async fn active_for(&self, user_id: i64) -> DbResult<Option<WorkEntry>> {
        let conn = self.db.lock().await?;
        let records = select_records(
            &conn,
            "SELECT wh.*, p.name AS project_name, p.location AS project_location
             FROM work_hours wh
             JOIN projects p ON wh.project_id = p.id
             WHERE wh.user_id = ?1 AND wh.end_work_time IS NULL",
            params![user_id],
        )?;
        records.first().map(WorkEntry::from_record).transpose()
    }

    /// Sessions started within `[from, to]` (either bound optional), newest first
    pub async fn by_user(
        &self,
        user_id: i64,
        from: Option<i64>,
        to: Option<i64>,
    ) -> DbResult<Vec<WorkEntry>> {
        let conn = self.db.lock().await?;
        let records = select_records(
            &conn,
            "SELECT wh.*, p.name AS project_name, p.location AS project_location
             FROM work_hours wh
             JOIN projects p ON wh.project_id = p.id
             WHERE wh.user_id = ?1
               AND (?2 IS NULL OR wh.start_work_time >= ?2)
               AND (?3 IS NULL OR wh.start_work_time <= ?3)
             ORDER BY wh.start_work_time DESC",
            params![user_id, from, to],
        )?;
        records.iter().map(WorkEntry::from_record).collect()
    }

    pub async fn sessions_between(
        &self,
        user_id: i64,
        start: i64,
        end: i64,
    ) -> DbResult<Vec<WorkEntry>> {
        self.by_user(user_id, Some(start), Some(end)).await
    }

    /// Sessions started on `date` in local time
    pub async fn report_for_day(&self, user_id: i64, date: NaiveDate) -> DbResult<DailyReport> {
        let (start, end) = local_day_bounds(date);
        let entries = self.sessions_between(user_id, start, end).await?;
        let total_millis = entries.iter().map(|e| e.session.duration()).sum();
        Ok(DailyReport {
            date,
            entries,
            total_millis,
        })
    }

    pub async fn today(&self, user_id: i64) -> DbResult<DailyReport> {
        self.report_for_day(user_id, Local::now().date_naive()).await
    }
}

fn active_on(conn: &Connection, user_id: i64) -> DbResult<Option<WorkSession>> {
    let record = WorkSession::query()
        .where_eq("user_id", user_id)
        .where_null("end_work_time")
        .first_on(conn)?;
    record.as_ref().map(WorkSession::from_record).transpose()
}

fn check_end(session: &WorkSession, at: i64) -> DbResult<()> {
    if at < session.start_work_time {
        return Err(DbError::EndBeforeStart {
            session_id: session.id.unwrap_or_default(),
            start: session.start_work_time,
            end: at,
        });
    }
    Ok(())
}

/// First and last millisecond of `date` in the local time zone
pub fn local_day_bounds(date: NaiveDate) -> (i64, i64) {
    let start = local_midnight(date);
    let end = date
        .succ_opt()
        .map(local_midnight)
        .unwrap_or(i64::MAX)
        .saturating_sub(1);
    (start, end)
}

fn local_midnight(date: NaiveDate) -> i64 {
    let midnight = date.and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}
