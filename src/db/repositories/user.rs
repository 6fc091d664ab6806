//! User repository

use tracing::debug;

use crate::db::error::DbResult;
use crate::db::models::{Model, User};
use crate::db::query::select_records;
use crate::db::Database;

pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Create a new user. A duplicate email fails with a unique violation.
    pub async fn create(&self, user: User) -> DbResult<User> {
        let user = User::create(&self.db, user).await?;
        debug!("Created user: {}", user.email);
        Ok(user)
    }

    pub async fn get(&self, id: i64) -> DbResult<Option<User>> {
        User::find(&self.db, id).await
    }

    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        User::find_by_email(&self.db, email).await
    }

    /// All users ordered by first then last name
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let conn = self.db.lock().await?;
        let records = select_records(
            &conn,
            "SELECT * FROM users ORDER BY first_name, last_name",
            [],
        )?;
        User::from_records(&records)
    }

    /// Persist every field of an existing user
    pub async fn update(&self, user: &mut User) -> DbResult<()> {
        user.save(&self.db).await
    }

    /// Delete a user together with their work sessions and signed-in session
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let removed = User::query().delete(&self.db, id).await? > 0;
        debug!("Deleted user: {}", id);
        Ok(removed)
    }
}
