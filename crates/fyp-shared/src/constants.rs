/// Application name
pub const APP_NAME: &str = "FYP Portal";

/// Capacity assumed for a supervisor whose `max_projects` is unset
pub const DEFAULT_MAX_PROJECTS: u32 = 5;

/// Inclusive bounds for grades and submission marks
pub const MIN_SCORE: i32 = 0;
pub const MAX_SCORE: i32 = 100;

/// Maximum uploaded deliverable size in bytes (25 MiB)
pub const MAX_UPLOAD_SIZE: usize = 25 * 1024 * 1024;

/// Default session lifetime
pub const SESSION_TTL_HOURS: i64 = 24;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;
