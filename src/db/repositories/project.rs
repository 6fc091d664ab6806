//! Project repository

use rusqlite::params;

use crate::db::error::{DbError, DbResult};
use crate::db::models::{now_millis, Location, Model, Project};
use crate::db::query::select_records;
use crate::db::{schema, Database};

pub struct ProjectRepository {
    db: Database,
}

impl ProjectRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get the database reference
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Create a new project. (name, location) must be unique.
    pub async fn create(
        &self,
        name: String,
        location: Location,
        description: Option<String>,
    ) -> DbResult<Project> {
        let project = Project {
            description,
            ..Project::new(name, location)
        };
        let project = Project::create(&self.db, project).await?;
        tracing::debug!("Created project: {} ({})", project.name, project.location);
        Ok(project)
    }

    /// Get a project by ID
    pub async fn get(&self, id: i64) -> DbResult<Option<Project>> {
        Project::find(&self.db, id).await
    }

    /// List active projects
    pub async fn list_active(&self) -> DbResult<Vec<Project>> {
        Project::active(&self.db).await
    }

    pub async fn by_location(&self, location: Location) -> DbResult<Vec<Project>> {
        Project::by_location(&self.db, location).await
    }

    /// Active projects whose name contains `term`
    pub async fn search(&self, term: &str) -> DbResult<Vec<Project>> {
        let pattern = format!("%{}%", escape_like(term));
        let conn = self.db.lock().await?;
        let records = select_records(
            &conn,
            "SELECT * FROM projects WHERE name LIKE ?1 ESCAPE '\\' AND is_active = 1 ORDER BY name",
            params![pattern],
        )?;
        Project::from_records(&records)
    }

    pub async fn update(&self, project: &mut Project) -> DbResult<()> {
        project.save(&self.db).await
    }

    /// Hide a project without deleting its history
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        self.set_active(id, false).await
    }

    pub async fn activate(&self, id: i64) -> DbResult<()> {
        self.set_active(id, true).await
    }

    /// Delete a project and every work session logged against it
    pub async fn delete(&self, id: i64) -> DbResult<bool> {
        let removed = Project::query().delete(&self.db, id).await? > 0;
        tracing::debug!("Deleted project: {}", id);
        Ok(removed)
    }

    async fn set_active(&self, id: i64, active: bool) -> DbResult<()> {
        let conn = self.db.lock().await?;
        let changed = conn.execute(
            "UPDATE projects SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, now_millis(), id],
        )?;
        if changed == 0 {
            return Err(DbError::NotPersisted(schema::PROJECTS));
        }
        tracing::debug!("Set project {} active = {}", id, active);
        Ok(())
    }
}

/// Match `%`, `_` and `\` literally in a LIKE pattern
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
