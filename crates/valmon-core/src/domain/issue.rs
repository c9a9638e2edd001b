//! Tracked issues and their forward-only lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventId;

/// Severity of a tracked issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            _ => Err(()),
        }
    }
}

/// Lifecycle position of an issue: active -> fixing -> resolved.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Active,
    Fixing,
    Resolved,
}

impl IssueStatus {
    /// Position in the lifecycle. Transitions may only increase it.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Fixing => 1,
            Self::Resolved => 2,
        }
    }

    /// Whether the issue still needs attention.
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Resolved)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Fixing => "fixing",
            Self::Resolved => "resolved",
        }
    }
}

/// Issue identifier assigned by the engine's id generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub String);

impl IssueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transition an issue refused because it would move backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectedTransition {
    pub from: IssueStatus,
    pub to: IssueStatus,
}

/// A problem detected from failure events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: IssueId,
    pub severity: Severity,
    /// Normalized category derived from the triggering step label.
    pub category: String,
    pub message: String,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: IssueStatus,
    /// Events that contributed to this issue, in application order.
    pub correlated_event_ids: Vec<EventId>,
    /// The resolved issue this one superseded, when it was opened by a recurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reopens: Option<IssueId>,
}

impl Issue {
    /// Move the issue to `next`, recording the event responsible.
    ///
    /// Same-status and backward moves are refused; the issue is left untouched.
    pub fn advance(
        &mut self,
        next: IssueStatus,
        event_id: EventId,
        at: DateTime<Utc>,
    ) -> std::result::Result<(), RejectedTransition> {
        if next.rank() <= self.status.rank() {
            return Err(RejectedTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.correlate(event_id, at);
        Ok(())
    }

    /// Attach an event without changing status.
    pub fn correlate(&mut self, event_id: EventId, at: DateTime<Utc>) {
        self.correlated_event_ids.push(event_id);
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}
