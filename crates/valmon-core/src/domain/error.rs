//! Domain-level error taxonomy for valmon.

/// Errors produced by raw event validation.
///
/// A malformed event is dropped; the session it names is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEventError {
    #[error("event missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("event field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("unknown event status: {status}")]
    UnknownStatus { status: String },

    #[error("unknown severity hint: {severity}")]
    UnknownSeverity { severity: String },

    #[error("unparseable timestamp {timestamp:?}: {reason}")]
    InvalidTimestamp { timestamp: String, reason: String },

    #[error("event session {event_session} does not match target session {target_session}")]
    SessionMismatch {
        event_session: String,
        target_session: String,
    },
}

/// A raw event dropped from a delivery, with its position in the delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEvent {
    pub index: usize,
    pub error: MalformedEventError,
}

/// Which engine invariant a defect broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvariantKind {
    /// `recent + Σ summaries` no longer equals the number of applied events.
    CountConservation,
    /// The recent window outgrew `max_events_before_summarize`.
    BoundedWindow,
    /// An issue was asked to move backwards through its lifecycle.
    ForwardLifecycle,
}

impl std::fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CountConservation => "count_conservation",
            Self::BoundedWindow => "bounded_window",
            Self::ForwardLifecycle => "forward_lifecycle",
        };
        f.write_str(name)
    }
}

/// Internal engine defect. Always carries a JSON snapshot of the session
/// state at the moment it was detected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invariant {kind} violated in session {session_id}: {detail}")]
pub struct InvariantViolation {
    pub kind: InvariantKind,
    pub session_id: String,
    pub detail: String,
    pub snapshot: serde_json::Value,
}

/// Errors surfaced at the engine boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("malformed event: {0}")]
    Malformed(#[from] MalformedEventError),

    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// Every event of a delivery to a session that does not exist yet was
    /// malformed. Carries each rejection so none of the reasons are lost.
    #[error("all {} event(s) for new session {session_id} were malformed", .rejected.len())]
    DeliveryRejected {
        session_id: String,
        rejected: Vec<RejectedEvent>,
    },

    #[error("unknown summary {summary_id} in session {session_id}")]
    UnknownSummary {
        session_id: String,
        summary_id: String,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("engine defect: {0}")]
    Invariant(#[from] Box<InvariantViolation>),
}

impl EngineError {
    /// True when the error points at a bug in the engine rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Result type for valmon engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
