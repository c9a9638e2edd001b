//! Per-session monitoring state and the read-only view handed to callers.
//!
//! A [`SessionState`] is only mutated through [`SessionState::apply`], which
//! runs the ingest, issue, actor and health steps in a fixed order and then
//! re-checks the engine invariants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::{resolve_actor, ActorResolution};
use crate::config::EngineConfig;
use crate::domain::digest::compute_digest;
use crate::domain::{
    EventId, EventSummary, InvariantKind, InvariantViolation, Issue, SummaryId, ValidationEvent,
};
use crate::health::{derive_health, HealthStatus};
use crate::ids::IdGenerator;
use crate::ingest::{self, AppendOutcome, BatchAppend, DedupeWindow};
use crate::issues::{apply_to_issues, IssueChange, IssueCounts, IssueRegistry};

/// Complete monitoring state of one session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) session_id: String,
    pub(crate) recent_events: Vec<ValidationEvent>,
    pub(crate) summaries: Vec<EventSummary>,
    pub(crate) issues: IssueRegistry,
    pub(crate) current_actor: ActorResolution,
    pub(crate) health_status: HealthStatus,
    pub(crate) total_events: u64,
    pub(crate) seen: DedupeWindow,
    pub(crate) last_timestamp: Option<DateTime<Utc>>,
}

/// What applying one validated event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event id was already applied; nothing changed.
    Duplicate,
    Applied {
        summary: Option<SummaryId>,
        out_of_order: bool,
        issue_change: IssueChange,
        previous_health: HealthStatus,
    },
}

/// What applying one delivery of events did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: Vec<EventId>,
    pub duplicates: Vec<EventId>,
    pub out_of_order: Vec<EventId>,
    pub summary: Option<SummaryId>,
    pub issue_changes: Vec<IssueChange>,
    pub previous_health: HealthStatus,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            recent_events: Vec::new(),
            summaries: Vec::new(),
            issues: IssueRegistry::new(),
            current_actor: ActorResolution::idle(),
            health_status: HealthStatus::Monitoring,
            total_events: 0,
            seen: DedupeWindow::default(),
            last_timestamp: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn recent_events(&self) -> &[ValidationEvent] {
        &self.recent_events
    }

    pub fn summaries(&self) -> &[EventSummary] {
        &self.summaries
    }

    pub fn issues(&self) -> &IssueRegistry {
        &self.issues
    }

    pub fn current_actor(&self) -> &ActorResolution {
        &self.current_actor
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health_status
    }

    /// Whether `id` would be dropped as a duplicate if applied now.
    pub fn has_seen(&self, id: &EventId) -> bool {
        ingest::is_duplicate(self, id)
    }

    /// Number of distinct events applied over the session's lifetime.
    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    /// Apply one validated event.
    ///
    /// # Errors
    ///
    /// Returns an [`InvariantViolation`] if the state breaks count
    /// conservation, the window bound, or forward-only issue lifecycles.
    /// The session keeps whatever state it reached; callers decide whether
    /// to keep using it.
    pub fn apply(
        &mut self,
        event: ValidationEvent,
        config: &EngineConfig,
        ids: &mut dyn IdGenerator,
    ) -> Result<ApplyOutcome, Box<InvariantViolation>> {
        let previous_health = self.health_status;
        let probe = event.clone();

        let (summary, out_of_order) = match ingest::append(self, event, config, ids) {
            AppendOutcome::Duplicate => return Ok(ApplyOutcome::Duplicate),
            AppendOutcome::Appended {
                summary,
                out_of_order,
            } => (summary, out_of_order),
        };

        let issue_change = self.fold_issue(&probe, ids)?;
        self.refresh_derived();
        self.check_invariants(config)?;

        Ok(ApplyOutcome::Applied {
            summary,
            out_of_order,
            issue_change,
            previous_health,
        })
    }

    /// Apply a delivery of validated events as one append.
    ///
    /// Issues are folded per event in arrival order; the window is
    /// summarized at most once, after the whole delivery is appended.
    ///
    /// # Errors
    ///
    /// Same as [`Self::apply`].
    pub fn apply_batch(
        &mut self,
        events: Vec<ValidationEvent>,
        config: &EngineConfig,
        ids: &mut dyn IdGenerator,
    ) -> Result<BatchOutcome, Box<InvariantViolation>> {
        let previous_health = self.health_status;
        let probes = events.clone();
        let BatchAppend {
            appended,
            duplicates,
            out_of_order,
            summary,
        } = ingest::append_batch(self, events, config, ids);

        let mut issue_changes = Vec::with_capacity(appended.len());
        let mut pending = appended.iter().peekable();
        for probe in &probes {
            if pending.peek() != Some(&&probe.id) {
                continue;
            }
            pending.next();
            issue_changes.push(self.fold_issue(probe, ids)?);
        }

        self.refresh_derived();
        self.check_invariants(config)?;

        Ok(BatchOutcome {
            applied: appended,
            duplicates,
            out_of_order,
            summary,
            issue_changes,
            previous_health,
        })
    }

    fn fold_issue(
        &mut self,
        event: &ValidationEvent,
        ids: &mut dyn IdGenerator,
    ) -> Result<IssueChange, Box<InvariantViolation>> {
        apply_to_issues(&mut self.issues, event, ids).map_err(|rejected| {
            self.violation(
                InvariantKind::ForwardLifecycle,
                format!(
                    "event {} asked an issue to move {} -> {}",
                    event.id,
                    rejected.from.as_str(),
                    rejected.to.as_str()
                ),
            )
        })
    }

    fn refresh_derived(&mut self) {
        self.current_actor = resolve_actor(&self.recent_events);
        self.health_status = derive_health(self.issues.as_slice());
    }

    /// Verify count conservation and the window bound.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant with a state snapshot attached.
    pub fn check_invariants(&self, config: &EngineConfig) -> Result<(), Box<InvariantViolation>> {
        let summarized: u64 = self.summaries.iter().map(|s| s.events_count).sum();
        let recent = self.recent_events.len() as u64;
        if recent + summarized != self.total_events {
            return Err(self.violation(
                InvariantKind::CountConservation,
                format!(
                    "recent {recent} + summarized {summarized} != applied {}",
                    self.total_events
                ),
            ));
        }
        if self.recent_events.len() > config.max_events_before_summarize {
            return Err(self.violation(
                InvariantKind::BoundedWindow,
                format!(
                    "recent window holds {} events, max is {}",
                    self.recent_events.len(),
                    config.max_events_before_summarize
                ),
            ));
        }
        Ok(())
    }

    fn violation(&self, kind: InvariantKind, detail: String) -> Box<InvariantViolation> {
        Box::new(InvariantViolation {
            kind,
            session_id: self.session_id.clone(),
            detail,
            snapshot: self.snapshot(),
        })
    }

    /// JSON snapshot of the full session view, for diagnostics.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self.view()).unwrap_or_else(|err| {
            serde_json::json!({
                "sessionId": self.session_id,
                "snapshotError": err.to_string(),
            })
        })
    }

    /// Owned, serializable copy of the state for rendering.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.session_id.clone(),
            recent_events: self.recent_events.clone(),
            summaries: self.summaries.clone(),
            issues: self.issues.as_slice().to_vec(),
            current_actor: self.current_actor.clone(),
            health_status: self.health_status,
            total_event_count: self.total_events,
            issue_counts: self.issues.counts(),
        }
    }
}

/// Read-only projection of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub recent_events: Vec<ValidationEvent>,
    pub summaries: Vec<EventSummary>,
    pub issues: Vec<Issue>,
    pub current_actor: ActorResolution,
    pub health_status: HealthStatus,
    pub total_event_count: u64,
    pub issue_counts: IssueCounts,
}

impl SessionView {
    /// Content digest of the view (SHA-256 over canonical JSON).
    ///
    /// Two views built from the same event sequence with the same id
    /// generator have the same digest.
    ///
    /// # Errors
    ///
    /// Returns a serde error if the view cannot be serialized.
    pub fn digest(&self) -> serde_json::Result<String> {
        compute_digest(self)
    }
}
