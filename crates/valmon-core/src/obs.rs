//! Structured observability hooks for the monitoring engine.
//!
//! This module provides:
//! - Session-scoped tracing spans via the `SessionSpan` RAII guard
//! - Emission functions for ingest, summarization, issue and health events
//!
//! Every event carries an `event = "<area>.<name>"` field so JSON output can
//! be filtered without parsing messages. Levels follow `VALMON_LOG`.

use tracing::{debug, error, info, warn};

use crate::domain::{InvariantViolation, IssueStatus, MalformedEventError, Severity};
use crate::health::HealthStatus;

/// RAII guard that enters a session-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = SessionSpan::enter("session-42");
/// // every tracing call below carries session_id = "session-42"
/// ```
pub struct SessionSpan {
    _span: tracing::span::EnteredSpan,
}

impl SessionSpan {
    /// Create and enter a span tagged with the session id.
    pub fn enter(session_id: &str) -> Self {
        let span = tracing::info_span!("valmon.session", session_id = %session_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: first event for a previously unknown session.
pub fn emit_session_opened(session_id: &str) {
    info!(event = "session.opened", session_id = %session_id);
}

/// Emit event: session closed and its state released.
pub fn emit_session_closed(session_id: &str, total_events: u64) {
    info!(event = "session.closed", session_id = %session_id, total_events = total_events);
}

/// Emit event: one event applied to a session.
pub fn emit_event_applied(session_id: &str, event_id: &str, status: &str, seq: u64) {
    debug!(
        event = "event.applied",
        session_id = %session_id,
        event_id = %event_id,
        status = %status,
        seq = seq,
    );
}

/// Emit event: one delivery of events applied to a session.
pub fn emit_batch_applied(session_id: &str, applied: usize, duplicates: usize, rejected: usize) {
    info!(
        event = "batch.applied",
        session_id = %session_id,
        applied = applied,
        duplicates = duplicates,
        rejected = rejected,
    );
}

/// Emit event: an event id that was already applied.
pub fn emit_duplicate_ignored(session_id: &str, event_id: &str) {
    debug!(event = "event.duplicate_ignored", session_id = %session_id, event_id = %event_id);
}

/// Emit event: a raw event failed validation and was dropped (warning level).
pub fn emit_event_rejected(session_id: &str, error: &MalformedEventError) {
    warn!(event = "event.rejected", session_id = %session_id, error = %error);
}

/// Emit event: an event arrived with a timestamp older than one already seen.
pub fn emit_out_of_order(session_id: &str, event_id: &str) {
    warn!(event = "event.out_of_order", session_id = %session_id, event_id = %event_id);
}

/// Emit event: the recent window overflowed and was compacted.
pub fn emit_summary_created(session_id: &str, summary_id: &str, events_count: u64) {
    info!(
        event = "summary.created",
        session_id = %session_id,
        summary_id = %summary_id,
        events_count = events_count,
    );
}

/// Emit event: new issue opened.
pub fn emit_issue_opened(
    session_id: &str,
    issue_id: &str,
    severity: Severity,
    reopens: Option<&str>,
) {
    info!(
        event = "issue.opened",
        session_id = %session_id,
        issue_id = %issue_id,
        severity = severity.as_str(),
        reopens = reopens.unwrap_or(""),
    );
}

/// Emit event: issue moved forward through its lifecycle.
pub fn emit_issue_transition(session_id: &str, issue_id: &str, from: IssueStatus, to: IssueStatus) {
    info!(
        event = "issue.transition",
        session_id = %session_id,
        issue_id = %issue_id,
        from = from.as_str(),
        to = to.as_str(),
    );
}

/// Emit event: aggregate health label changed.
pub fn emit_health_changed(session_id: &str, from: HealthStatus, to: HealthStatus) {
    info!(
        event = "health.changed",
        session_id = %session_id,
        from = from.as_str(),
        to = to.as_str(),
    );
}

/// Emit event: engine defect, with the offending state snapshot (error level).
pub fn emit_invariant_violation(violation: &InvariantViolation) {
    error!(
        event = "invariant.violated",
        session_id = %violation.session_id,
        kind = %violation.kind,
        detail = %violation.detail,
        snapshot = %violation.snapshot,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InvariantKind;
    use tracing_test::traced_test;

    #[test]
    fn test_session_span_create() {
        let _span = SessionSpan::enter("test-session");
    }

    #[traced_test]
    #[test]
    fn test_rejected_event_logged_with_reason() {
        emit_event_rejected("s-1", &MalformedEventError::MissingField { field: "step" });
        assert!(logs_contain("event.rejected"));
        assert!(logs_contain("step"));
    }

    #[traced_test]
    #[test]
    fn test_violation_logs_snapshot() {
        let violation = InvariantViolation {
            kind: InvariantKind::BoundedWindow,
            session_id: "s-1".to_string(),
            detail: "recent window holds 31 events, max is 30".to_string(),
            snapshot: serde_json::json!({ "totalEventCount": 31 }),
        };
        emit_invariant_violation(&violation);
        assert!(logs_contain("invariant.violated"));
        assert!(logs_contain("bounded_window"));
        assert!(logs_contain("totalEventCount"));
    }
}
