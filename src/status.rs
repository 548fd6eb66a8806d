//! Unit status reported to the orchestration platform.
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

/// Workload state as understood by the platform.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatusKind {
    /// The operator is working on the unit.
    #[default]
    Maintenance,
    /// The workload is running.
    Active,
    /// The unit needs human intervention.
    Blocked,
}

/// Status of the unit plus a human-readable message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStatus {
    kind: StatusKind,
    message: String,
}

impl UnitStatus {
    pub fn maintenance(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Maintenance,
            message: message.into(),
        }
    }

    pub fn active() -> Self {
        Self {
            kind: StatusKind::Active,
            message: String::new(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Blocked,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind.as_ref())
        } else {
            write!(f, "{}: {}", self.kind.as_ref(), self.message)
        }
    }
}
