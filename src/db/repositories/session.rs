//! Signed-in session repository

use rusqlite::params;

use crate::db::error::DbResult;
use crate::db::models::session::SESSION_ID;
use crate::db::models::{Model, Session, User};
use crate::db::query::select_records;
use crate::db::Database;

pub struct SessionRepository {
    db: Database,
}

impl SessionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub async fn current(&self) -> DbResult<Option<Session>> {
        Session::current(&self.db).await
    }

    pub async fn sign_in(&self, user_id: i64) -> DbResult<Session> {
        Session::set_current(&self.db, user_id).await
    }

    /// Returns whether anyone was signed in
    pub async fn sign_out(&self) -> DbResult<bool> {
        Session::clear(&self.db).await
    }

    /// Record activity for the signed-in user, if any
    pub async fn touch(&self) -> DbResult<Option<Session>> {
        let Some(mut session) = self.current().await? else {
            return Ok(None);
        };
        session.update_activity(&self.db).await?;
        Ok(Some(session))
    }

    /// The signed-in user
    pub async fn current_user(&self) -> DbResult<Option<User>> {
        let conn = self.db.lock().await?;
        let records = select_records(
            &conn,
            "SELECT u.* FROM session s JOIN users u ON u.id = s.user_id WHERE s.id = ?1",
            params![SESSION_ID],
        )?;
        records.first().map(User::from_record).transpose()
    }
}
