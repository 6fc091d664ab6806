//! Worklog - local time-tracking data layer
//!
//! SQLite store with versioned migrations, a small active-record layer and
//! the sign-in and work-session rules built on top of it.

pub mod cli;
pub mod config;
pub mod db;
