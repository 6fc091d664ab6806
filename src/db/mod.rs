//! Database module

pub mod connection;
pub mod error;
pub mod migrations;
pub mod models;
pub mod query;
pub mod repositories;
pub mod schema;

pub use connection::{Database, DbGuard};
pub use error::{DbError, DbResult};
pub use migrations::{Migration, MigrationRunner, MigrationStatus, MIGRATIONS};
pub use models::{Location, Model, Project, Session, User, WorkSession};
pub use query::{Direction, QueryBuilder, Record};
