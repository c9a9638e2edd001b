//! Validation events as reported by the external validator pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::Severity;

/// Outcome reported for a single validation step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Corrected,
}

impl EventStatus {
    pub const ALL: [EventStatus; 5] = [
        EventStatus::Pending,
        EventStatus::Running,
        EventStatus::Passed,
        EventStatus::Failed,
        EventStatus::Corrected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Corrected => "corrected",
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "corrected" => Ok(Self::Corrected),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event identifier, producer-assigned or stamped by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One validated step outcome. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEvent {
    pub id: EventId,
    pub session_id: String,
    /// Free-text step label, e.g. "Security Validation".
    pub step: String,
    pub status: EventStatus,
    pub timestamp: DateTime<Utc>,
    /// Human-readable detail, used by the correlation heuristics.
    #[serde(default)]
    pub details: String,
    /// Explicit back-reference to the issue a correction or resolution acts on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_issue_id: Option<String>,
    /// Producer-supplied severity for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

/// Producer ids arrive either as strings or as plain counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Unvalidated event as received from the transport.
///
/// Every field is optional so that validation can name exactly what is
/// missing instead of failing inside the deserializer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub related_issue_id: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
}

impl RawEvent {
    /// Convenience constructor used by producers and tests.
    pub fn new(
        session_id: impl Into<String>,
        step: impl Into<String>,
        status: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            step: Some(step.into()),
            status: Some(status.into()),
            timestamp: Some(timestamp.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(RawId::Text(id.into()));
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_related_issue(mut self, issue_id: impl Into<String>) -> Self {
        self.related_issue_id = Some(issue_id.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!("FAILED".parse::<EventStatus>(), Ok(EventStatus::Failed));
        assert_eq!(" corrected ".parse::<EventStatus>(), Ok(EventStatus::Corrected));
        assert!("exploded".parse::<EventStatus>().is_err());
    }

    #[test]
    fn test_raw_event_accepts_numeric_id() {
        let raw: RawEvent = serde_json::from_str(
            r#"{"id": 42, "sessionId": "s", "step": "Lint Check", "status": "passed",
                "timestamp": "2024-06-01T12:00:00Z"}"#,
        )
        .expect("deserialize");
        assert_eq!(raw.id, Some(RawId::Number(42)));
        assert_eq!(raw.id.map(RawId::into_string).as_deref(), Some("42"));
        assert!(raw.details.is_none());
    }

    #[test]
    fn test_validation_event_serializes_camel_case() {
        let event = ValidationEvent {
            id: EventId::new("e1"),
            session_id: "s".to_string(),
            step: "Lint Check".to_string(),
            status: EventStatus::Passed,
            timestamp: "2024-06-01T12:00:00Z".parse().expect("ts"),
            details: String::new(),
            related_issue_id: None,
            severity: None,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["sessionId"], "s");
        assert_eq!(json["status"], "passed");
        assert!(json.get("relatedIssueId").is_none());
    }
}
