//! Supervisor capacity verdict.
//!
//! The live count is produced by the store; this module only decides what
//! the numbers mean so that every caller applies the same rule.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_MAX_PROJECTS;
use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityStatus {
    pub is_full: bool,
    pub current: u32,
    pub limit: u32,
}

impl CapacityStatus {
    /// Build a verdict from a live `Ongoing` count and the supervisor's
    /// configured limit (`None` falls back to the default).
    pub fn evaluate(current: u32, max_projects: Option<u32>) -> Self {
        let limit = max_projects.unwrap_or(DEFAULT_MAX_PROJECTS);
        Self {
            is_full: current >= limit,
            current,
            limit,
        }
    }

    /// Fail unless there is room for one more project.
    pub fn ensure_room(&self) -> Result<(), LifecycleError> {
        if self.is_full {
            return Err(LifecycleError::CapacityExceeded {
                current: self.current,
                limit: self.limit,
            });
        }
        Ok(())
    }
}
