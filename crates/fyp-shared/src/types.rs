use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseEnumError;

/// Declares a newtype id over a v4 UUID that serializes as the bare UUID.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Declares a closed string enum with a stable text form used both on the
/// wire and in database columns.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

uuid_id!(
    /// Primary key of a user account.
    UserId
);
uuid_id!(
    /// Primary key of a project.
    ProjectId
);
uuid_id!(DeadlineId);
uuid_id!(NotificationId);
uuid_id!(TaskId);
uuid_id!(SubmissionId);
uuid_id!(PhaseId);

text_enum!(
    /// Account role. Fixed at creation by an admin.
    Role {
        Student => "student",
        Supervisor => "supervisor",
        Admin => "admin",
    }
);

text_enum!(
    /// Lifecycle status of a project. These strings are exactly what gets
    /// persisted.
    ProjectStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
        Ongoing => "Ongoing",
        PendingEvaluation => "Pending Evaluation",
        RevisionRequested => "Revision Requested",
        Completed => "Completed",
    }
);

impl ProjectStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProjectStatus::Rejected | ProjectStatus::Completed)
    }

    /// Whether deliverables may be uploaded in this status.
    pub fn accepts_submissions(&self) -> bool {
        matches!(
            self,
            ProjectStatus::Ongoing
                | ProjectStatus::PendingEvaluation
                | ProjectStatus::RevisionRequested
        )
    }
}

text_enum!(
    RequestStatus {
        Sent => "Sent",
        Accepted => "Accepted",
        Rejected => "Rejected",
        Cancelled => "Cancelled",
    }
);

text_enum!(
    TaskStatus {
        ToDo => "ToDo",
        InProgress => "InProgress",
        Done => "Done",
    }
);

text_enum!(
    Priority {
        Low => "Low",
        Medium => "Medium",
        High => "High",
    }
);

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

text_enum!(
    PhaseStatus {
        Pending => "Pending",
        InProgress => "InProgress",
        Completed => "Completed",
    }
);

text_enum!(
    SubmissionStatus {
        Submitted => "Submitted",
        Reviewed => "Reviewed",
        ChangesRequested => "ChangesRequested",
    }
);

text_enum!(
    /// Breadth of applicability of a deadline.
    DeadlineScope {
        Global => "Global",
        Batch => "Batch",
        Group => "Group",
    }
);

text_enum!(
    NotificationType {
        Proposal => "proposal",
        Request => "request",
        Approval => "approval",
        Rejection => "rejection",
        Assignment => "assignment",
        Evaluation => "evaluation",
        Revision => "revision",
        Grade => "grade",
        Submission => "submission",
        Task => "task",
        Deadline => "deadline",
        Feedback => "feedback",
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_text_round_trips() {
        for status in ProjectStatus::ALL {
            assert_eq!(ProjectStatus::from_str(status.as_str()).unwrap(), *status);
        }
        assert_eq!(ProjectStatus::ALL.len(), 7);
    }

    #[test]
    fn test_status_serializes_with_spaces() {
        let json = serde_json::to_string(&ProjectStatus::PendingEvaluation).unwrap();
        assert_eq!(json, "\"Pending Evaluation\"");
        let back: ProjectStatus = serde_json::from_str("\"Revision Requested\"").unwrap();
        assert_eq!(back, ProjectStatus::RevisionRequested);
    }

    #[test]
    fn test_unknown_status_rejected() {
        let err = ProjectStatus::from_str("Archived").unwrap_err();
        assert_eq!(err.value, "Archived");
        assert!(serde_json::from_str::<ProjectStatus>("\"Archived\"").is_err());
    }

    #[test]
    fn test_ids_serialize_as_bare_uuid() {
        let id = UserId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
    }
}
