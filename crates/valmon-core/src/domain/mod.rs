//! Domain models for valmon.
//!
//! Canonical definitions for the core entities:
//! - `ValidationEvent`: one reported step outcome
//! - `EventSummary`: immutable rollup of compacted events
//! - `Issue`: a tracked problem with a forward lifecycle

pub mod digest;
pub mod error;
pub mod event;
pub mod issue;
pub mod summary;
pub mod validation;

// Re-export main types and errors
pub use error::{
    EngineError, InvariantKind, InvariantViolation, MalformedEventError, RejectedEvent, Result,
};
pub use event::{EventId, EventStatus, RawEvent, RawId, ValidationEvent};
pub use issue::{Issue, IssueId, IssueStatus, RejectedTransition, Severity};
pub use summary::{EventSummary, StatusCounts, SummaryId, SummaryStats, TimeRange};
pub use validation::{parse_timestamp, validate};
