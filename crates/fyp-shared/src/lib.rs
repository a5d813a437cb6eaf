//! # fyp-shared
//!
//! Domain vocabulary for the FYP portal: identifiers and enums, the project
//! lifecycle transition table, the notification catalog, the supervisor
//! capacity verdict, and signed session tokens. Nothing in here performs
//! I/O.

pub mod capacity;
pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod notice;
pub mod session;
pub mod types;

pub use error::{LifecycleError, TokenError};
