//! # fyp-store
//!
//! SQLite persistence for the FYP portal.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. Project lifecycle writes are conditional updates so that a lost
//! race surfaces as [`StoreError::Conflict`] or
//! [`StoreError::CapacityExceeded`] instead of a silent overwrite.

pub mod capacity;
pub mod database;
pub mod deadlines;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod projects;
pub mod users;

mod convert;
mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
