//! valmon core library
//!
//! Folds a live stream of validation events into per-session state: a
//! bounded window of recent events, collapsible summaries of older ones,
//! tracked issues with a forward-only lifecycle, the party expected to act
//! next, and one aggregate health label.

pub mod actor;
pub mod config;
pub mod domain;
pub mod engine;
pub mod health;
pub mod ids;
pub mod ingest;
pub mod issues;
pub mod metrics;
pub mod obs;
pub mod session;
pub mod telemetry;
pub mod windowing;

pub use actor::{resolve_actor, Actor, ActorResolution};
pub use config::EngineConfig;
pub use domain::{
    EngineError, EventId, EventStatus, EventSummary, InvariantKind, InvariantViolation, Issue,
    IssueId, IssueStatus, MalformedEventError, RawEvent, RawId, RejectedEvent, Result, Severity,
    StatusCounts, SummaryId, SummaryStats, TimeRange, ValidationEvent,
};
pub use engine::{BatchReport, MonitorEngine};
pub use health::{derive_health, HealthStatus};
pub use ids::{IdGenerator, IdKind, SequentialIds, UuidIds};
pub use issues::{IssueChange, IssueCounts, IssueRegistry};
pub use session::{ApplyOutcome, BatchOutcome, SessionState, SessionView};

pub use metrics::METRICS;
pub use obs::SessionSpan;
pub use telemetry::init_tracing;

/// valmon version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
