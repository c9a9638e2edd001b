//! Raw event validation.
//!
//! Turns a [`RawEvent`] from the transport into a [`ValidationEvent`], or
//! names the first field that makes it unusable. Pure: no ids are minted
//! and nothing is logged here.

use chrono::{DateTime, Utc};

use super::error::MalformedEventError;
use super::event::{EventId, EventStatus, RawEvent, ValidationEvent};
use super::issue::Severity;

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, MalformedEventError> {
    match value.as_deref() {
        None => Err(MalformedEventError::MissingField { field }),
        Some(v) if v.trim().is_empty() => Err(MalformedEventError::EmptyField { field }),
        Some(v) => Ok(v),
    }
}

/// Parse an RFC 3339 instant into UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, MalformedEventError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| MalformedEventError::InvalidTimestamp {
            timestamp: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Validate a raw event.
///
/// Checks, in order:
/// 1. `id` is present and non-empty.
/// 2. `sessionId` and `step` are present and non-empty.
/// 3. `status` is one of pending, running, passed, failed, corrected.
/// 4. `timestamp` parses as RFC 3339.
/// 5. An optional `severity` hint names a known severity.
///
/// # Errors
///
/// Returns the [`MalformedEventError`] for the first failed check.
pub fn validate(raw: &RawEvent) -> Result<ValidationEvent, MalformedEventError> {
    let id = match raw.id.clone().map(|id| id.into_string()) {
        None => return Err(MalformedEventError::MissingField { field: "id" }),
        Some(id) if id.trim().is_empty() => {
            return Err(MalformedEventError::EmptyField { field: "id" })
        }
        Some(id) => id,
    };
    let session_id = required(&raw.session_id, "sessionId")?;
    let step = required(&raw.step, "step")?;
    let status_raw = required(&raw.status, "status")?;
    let status: EventStatus =
        status_raw
            .parse()
            .map_err(|_| MalformedEventError::UnknownStatus {
                status: status_raw.to_string(),
            })?;
    let timestamp = parse_timestamp(required(&raw.timestamp, "timestamp")?)?;

    let severity = match raw.severity.as_deref() {
        None => None,
        Some(s) if s.trim().is_empty() => None,
        Some(s) => Some(
            s.parse::<Severity>()
                .map_err(|_| MalformedEventError::UnknownSeverity {
                    severity: s.to_string(),
                })?,
        ),
    };

    let related_issue_id = raw
        .related_issue_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ValidationEvent {
        id: EventId::new(id),
        session_id: session_id.to_string(),
        step: step.trim().to_string(),
        status,
        timestamp,
        details: raw.details.clone().unwrap_or_default(),
        related_issue_id,
        severity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::RawId;

    fn raw() -> RawEvent {
        RawEvent::new("s-1", "Security Validation", "failed", "2024-06-01T12:00:00Z")
            .with_id("e1")
            .with_details("SQL injection in handler")
    }

    #[test]
    fn test_valid_event_passes() {
        let event = validate(&raw()).expect("valid");
        assert_eq!(event.id.as_str(), "e1");
        assert_eq!(event.session_id, "s-1");
        assert_eq!(event.status, EventStatus::Failed);
        assert_eq!(event.details, "SQL injection in handler");
        assert!(event.severity.is_none());
    }

    #[test]
    fn test_missing_id_rejected() {
        let mut raw = raw();
        raw.id = None;
        assert_eq!(
            validate(&raw).unwrap_err(),
            MalformedEventError::MissingField { field: "id" }
        );
    }

    #[test]
    fn test_numeric_id_accepted() {
        let mut raw = raw();
        raw.id = Some(RawId::Number(7));
        assert_eq!(validate(&raw).expect("valid").id.as_str(), "7");
    }

    #[test]
    fn test_empty_session_rejected() {
        let mut raw = raw();
        raw.session_id = Some("   ".to_string());
        assert_eq!(
            validate(&raw).unwrap_err(),
            MalformedEventError::EmptyField { field: "sessionId" }
        );
    }

    #[test]
    fn test_missing_step_rejected() {
        let mut raw = raw();
        raw.step = None;
        assert_eq!(
            validate(&raw).unwrap_err(),
            MalformedEventError::MissingField { field: "step" }
        );
    }

    #[test]
    fn test_unknown_status_rejected() {
        let mut raw = raw();
        raw.status = Some("exploded".to_string());
        match validate(&raw).unwrap_err() {
            MalformedEventError::UnknownStatus { status } => assert_eq!(status, "exploded"),
            other => panic!("Expected UnknownStatus, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_timestamp_rejected() {
        let mut raw = raw();
        raw.timestamp = Some("yesterday".to_string());
        assert!(matches!(
            validate(&raw).unwrap_err(),
            MalformedEventError::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn test_offset_timestamp_normalized_to_utc() {
        let mut raw = raw();
        raw.timestamp = Some("2024-06-01T14:00:00+02:00".to_string());
        let event = validate(&raw).expect("valid");
        assert_eq!(event.timestamp, parse_timestamp("2024-06-01T12:00:00Z").expect("ts"));
    }

    #[test]
    fn test_severity_hint_parsed() {
        let event = validate(&raw().with_severity("Warning")).expect("valid");
        assert_eq!(event.severity, Some(Severity::Warning));

        let err = validate(&raw().with_severity("catastrophic")).unwrap_err();
        assert!(matches!(err, MalformedEventError::UnknownSeverity { .. }));
    }

    #[test]
    fn test_blank_related_issue_dropped() {
        let event = validate(&raw().with_related_issue("  ")).expect("valid");
        assert!(event.related_issue_id.is_none());
    }
}
