//! Health check results and verdict aggregation.

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

/// Status of a single named check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl Display for CheckStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: String,
    /// Milliseconds spent on the check, when it involved I/O.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl CheckResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_status(CheckStatus::Error, message)
    }

    pub fn timed(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    fn with_status(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            duration: None,
        }
    }
}

/// Checks in the order they ran.
pub type HealthChecks = IndexMap<String, CheckResult>;

/// Overall verdict derived from every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthVerdict {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthVerdict {
    /// `healthy` when all checks pass, `unhealthy` when any errored, otherwise `degraded`.
    pub fn from_checks(checks: &HealthChecks) -> Self {
        let statuses = || checks.values().map(|check| check.status);
        if statuses().any(|status| status == CheckStatus::Error) {
            Self::Unhealthy
        } else if statuses().all(|status| status == CheckStatus::Ok) {
            Self::Healthy
        } else {
            Self::Degraded
        }
    }

    /// HTTP status mirrored by the health endpoint.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Healthy | Self::Degraded => 200,
            Self::Unhealthy => 503,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl Display for HealthVerdict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
