//! Typed repositories over the models

pub mod project;
pub mod session;
pub mod user;
pub mod work_hours;

pub use project::ProjectRepository;
pub use session::SessionRepository;
pub use user::UserRepository;
pub use work_hours::{local_day_bounds, DailyReport, WorkEntry, WorkHoursRepository};
