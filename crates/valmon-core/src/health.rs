//! Aggregate health status derived from the issue registry.

use serde::{Deserialize, Serialize};

use crate::domain::{Issue, IssueStatus, Severity};

/// Single dashboard label for a session's issue state, most urgent first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// A critical issue is active.
    Critical,
    /// An error-severity issue is active.
    IssuesFound,
    /// A warning-severity issue is active.
    AttentionNeeded,
    /// No blocking active issue, but corrections are under way.
    Fixing,
    /// Every issue ever seen has been resolved.
    AllClear,
    /// Nothing to report yet.
    #[default]
    Monitoring,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::IssuesFound => "issues_found",
            Self::AttentionNeeded => "attention_needed",
            Self::Fixing => "fixing",
            Self::AllClear => "all_clear",
            Self::Monitoring => "monitoring",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the health label from the current issue set.
///
/// Priority: critical-active, error-active, warning-active, any fixing,
/// all resolved, then monitoring. Info-severity active issues alone do not
/// raise the status above `monitoring`.
pub fn derive_health(issues: &[Issue]) -> HealthStatus {
    let active_at = |severity: Severity| {
        issues
            .iter()
            .any(|i| i.status == IssueStatus::Active && i.severity == severity)
    };

    if active_at(Severity::Critical) {
        HealthStatus::Critical
    } else if active_at(Severity::Error) {
        HealthStatus::IssuesFound
    } else if active_at(Severity::Warning) {
        HealthStatus::AttentionNeeded
    } else if issues.iter().any(|i| i.status == IssueStatus::Fixing) {
        HealthStatus::Fixing
    } else if !issues.is_empty() && issues.iter().all(|i| i.status == IssueStatus::Resolved) {
        HealthStatus::AllClear
    } else {
        HealthStatus::Monitoring
    }
}
