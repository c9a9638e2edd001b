//! The monitoring engine: owns every session and is the only entry point
//! that mutates them.
//!
//! All mutation goes through `&mut self`, so one engine value is one
//! serialization point. Callers that receive events concurrently put the
//! engine behind a single consumer (see the `valmon` CLI) or a mutex.

use std::collections::{HashMap, HashSet};

use crate::config::EngineConfig;
use crate::domain::{
    validate, EngineError, EventId, EventSummary, InvariantViolation, MalformedEventError,
    RawEvent, RawId, RejectedEvent, Result, SummaryId, ValidationEvent,
};
use crate::ids::{IdGenerator, IdKind, UuidIds};
use crate::issues::IssueChange;
use crate::metrics::METRICS;
use crate::obs::{self, SessionSpan};
use crate::session::{ApplyOutcome, BatchOutcome, SessionState, SessionView};

/// Result of [`MonitorEngine::apply_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub view: SessionView,
    pub rejected: Vec<RejectedEvent>,
}

/// Session-keyed validation monitor.
pub struct MonitorEngine {
    config: EngineConfig,
    ids: Box<dyn IdGenerator>,
    sessions: HashMap<String, SessionState>,
    violations: Vec<InvariantViolation>,
}

impl std::fmt::Debug for MonitorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorEngine")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("violations", &self.violations.len())
            .finish()
    }
}

impl MonitorEngine {
    /// Engine with UUID-based ids.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the bounds are unusable.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_id_generator(config, Box::new(UuidIds))
    }

    /// Engine with an injected id source, e.g. [`crate::ids::SequentialIds`]
    /// for reproducible replay.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the bounds are unusable.
    pub fn with_id_generator(config: EngineConfig, ids: Box<dyn IdGenerator>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ids,
            sessions: HashMap::new(),
            violations: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a raw event and apply it to `session_id`.
    ///
    /// A missing event id is stamped by the engine and a missing session id
    /// is taken from `session_id`. Unknown sessions are created on their
    /// first valid event.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Malformed`] if validation fails. No session is
    ///   touched or created.
    /// - [`EngineError::Invariant`] if applying the event broke an engine
    ///   invariant. The violation is also kept for [`Self::drain_violations`].
    pub fn apply_event(&mut self, session_id: &str, raw: RawEvent) -> Result<SessionView> {
        let _span = SessionSpan::enter(session_id);

        let event = match self.prepare(session_id, raw, &mut HashSet::new()) {
            Ok(event) => event,
            Err(err) => {
                METRICS.inc_events_rejected();
                obs::emit_event_rejected(session_id, &err);
                return Err(err.into());
            }
        };

        let state = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                obs::emit_session_opened(session_id);
                SessionState::new(session_id)
            });

        let event_id = event.id.clone();
        let status = event.status;
        let outcome = match state.apply(event, &self.config, self.ids.as_mut()) {
            Ok(outcome) => outcome,
            Err(violation) => {
                METRICS.inc_invariant_violations();
                obs::emit_invariant_violation(&violation);
                self.violations.push((*violation).clone());
                return Err(EngineError::Invariant(violation));
            }
        };

        match outcome {
            ApplyOutcome::Duplicate => {
                METRICS.inc_duplicates_ignored();
                obs::emit_duplicate_ignored(session_id, event_id.as_str());
            }
            ApplyOutcome::Applied {
                summary,
                out_of_order,
                issue_change,
                previous_health,
            } => {
                METRICS.inc_events_applied();
                obs::emit_event_applied(
                    session_id,
                    event_id.as_str(),
                    status.as_str(),
                    state.total_events(),
                );
                if out_of_order {
                    obs::emit_out_of_order(session_id, event_id.as_str());
                }
                report_summary(state, session_id, summary);
                log_issue_change(session_id, &issue_change);
                if previous_health != state.health_status() {
                    obs::emit_health_changed(session_id, previous_health, state.health_status());
                }
            }
        }

        Ok(state.view())
    }

    /// Validate and apply one delivery of raw events to `session_id`.
    ///
    /// Malformed events are dropped individually and reported; the rest are
    /// appended in order and the window is summarized at most once.
    ///
    /// # Errors
    ///
    /// - [`EngineError::DeliveryRejected`] with every rejection if no event
    ///   in the delivery is valid and the session does not exist yet.
    /// - [`EngineError::UnknownSession`] for an empty delivery to an unknown
    ///   session.
    /// - [`EngineError::Invariant`] as for [`Self::apply_event`].
    pub fn apply_events(&mut self, session_id: &str, raws: Vec<RawEvent>) -> Result<BatchReport> {
        let _span = SessionSpan::enter(session_id);

        // Ids the producer chose for this delivery; stamped ids must avoid them.
        let mut reserved: HashSet<EventId> = raws
            .iter()
            .filter_map(|raw| raw.id.clone())
            .map(|id| EventId::new(id.into_string()))
            .collect();

        let mut events = Vec::with_capacity(raws.len());
        let mut rejected = Vec::new();
        for (index, raw) in raws.into_iter().enumerate() {
            match self.prepare(session_id, raw, &mut reserved) {
                Ok(event) => events.push(event),
                Err(error) => {
                    METRICS.inc_events_rejected();
                    obs::emit_event_rejected(session_id, &error);
                    rejected.push(RejectedEvent { index, error });
                }
            }
        }

        if events.is_empty() && !self.sessions.contains_key(session_id) {
            if rejected.is_empty() {
                return Err(EngineError::UnknownSession(session_id.to_string()));
            }
            return Err(EngineError::DeliveryRejected {
                session_id: session_id.to_string(),
                rejected,
            });
        }

        let state = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                obs::emit_session_opened(session_id);
                SessionState::new(session_id)
            });

        let outcome = match state.apply_batch(events, &self.config, self.ids.as_mut()) {
            Ok(outcome) => outcome,
            Err(violation) => {
                METRICS.inc_invariant_violations();
                obs::emit_invariant_violation(&violation);
                self.violations.push((*violation).clone());
                return Err(EngineError::Invariant(violation));
            }
        };

        let BatchOutcome {
            applied,
            duplicates,
            out_of_order,
            summary,
            issue_changes,
            previous_health,
        } = outcome;
        for id in &duplicates {
            METRICS.inc_duplicates_ignored();
            obs::emit_duplicate_ignored(session_id, id.as_str());
        }
        for id in &out_of_order {
            obs::emit_out_of_order(session_id, id.as_str());
        }
        obs::emit_batch_applied(session_id, applied.len(), duplicates.len(), rejected.len());
        for _ in &applied {
            METRICS.inc_events_applied();
        }
        report_summary(state, session_id, summary);
        for change in &issue_changes {
            log_issue_change(session_id, change);
        }
        if previous_health != state.health_status() {
            obs::emit_health_changed(session_id, previous_health, state.health_status());
        }

        Ok(BatchReport {
            view: state.view(),
            rejected,
        })
    }

    /// Run the same defaulting and validation as ingest without applying
    /// the event. No session is created or changed.
    ///
    /// # Errors
    ///
    /// Returns the [`MalformedEventError`] that [`Self::apply_event`] would
    /// reject the event with.
    pub fn check_event(
        &mut self,
        session_id: &str,
        raw: RawEvent,
    ) -> std::result::Result<ValidationEvent, MalformedEventError> {
        self.prepare(session_id, raw, &mut HashSet::new())
    }

    /// Fill engine-owned defaults, then validate.
    fn prepare(
        &mut self,
        session_id: &str,
        mut raw: RawEvent,
        reserved: &mut HashSet<EventId>,
    ) -> std::result::Result<ValidationEvent, MalformedEventError> {
        if session_id.trim().is_empty() {
            return Err(MalformedEventError::EmptyField { field: "sessionId" });
        }
        if raw.id.is_none() {
            let id = self.stamp_id(session_id, reserved);
            raw.id = Some(RawId::Text(id.as_str().to_string()));
            reserved.insert(id);
        }
        if raw.session_id.is_none() {
            raw.session_id = Some(session_id.to_string());
        }

        let event = validate(&raw)?;
        if event.session_id != session_id {
            return Err(MalformedEventError::SessionMismatch {
                event_session: event.session_id,
                target_session: session_id.to_string(),
            });
        }
        Ok(event)
    }

    /// Mint an event id that neither the session nor the current delivery
    /// already uses, so a stamped event is never taken for a duplicate.
    fn stamp_id(&mut self, session_id: &str, reserved: &HashSet<EventId>) -> EventId {
        let session = self.sessions.get(session_id);
        loop {
            let id = EventId::new(self.ids.next_id(IdKind::Event));
            let taken = reserved.contains(&id) || session.is_some_and(|s| s.has_seen(&id));
            if !taken {
                return id;
            }
        }
    }

    /// Current view of a session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownSession`] if no event was ever applied
    /// to `session_id` or it was closed.
    pub fn view(&self, session_id: &str) -> Result<SessionView> {
        self.session(session_id).map(SessionState::view)
    }

    /// Borrow a session's state without copying it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownSession`] for unknown ids.
    pub fn session(&self, session_id: &str) -> Result<&SessionState> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut SessionState> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| EngineError::UnknownSession(session_id.to_string()))
    }

    /// Flip one summary between collapsed and expanded and return the
    /// updated view. Nothing but that summary's `collapsed` flag changes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownSession`] or
    /// [`EngineError::UnknownSummary`].
    pub fn toggle_summary(&mut self, session_id: &str, summary_id: &str) -> Result<SessionView> {
        let state = self.session_mut(session_id)?;
        let id = SummaryId(summary_id.to_string());
        if crate::windowing::toggle_summary(state, &id).is_none() {
            return Err(EngineError::UnknownSummary {
                session_id: session_id.to_string(),
                summary_id: summary_id.to_string(),
            });
        }
        Ok(state.view())
    }

    /// Collapse or expand every summary of a session. Returns how many
    /// summaries changed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownSession`] for unknown ids.
    pub fn set_all_collapsed(&mut self, session_id: &str, collapsed: bool) -> Result<usize> {
        let state = self.session_mut(session_id)?;
        Ok(crate::windowing::set_all_collapsed(state, collapsed))
    }

    /// Release a session, returning its final view. `None` if unknown.
    pub fn close_session(&mut self, session_id: &str) -> Option<SessionView> {
        let state = self.sessions.remove(session_id)?;
        obs::emit_session_closed(session_id, state.total_events());
        METRICS.flush();
        Some(state.view())
    }

    /// Ids of all open sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Invariant violations recorded since the last drain.
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    pub fn drain_violations(&mut self) -> Vec<InvariantViolation> {
        std::mem::take(&mut self.violations)
    }
}

fn find_summary<'a>(summaries: &'a [EventSummary], id: &SummaryId) -> Option<&'a EventSummary> {
    summaries.iter().rev().find(|s| &s.id == id)
}

fn report_summary(state: &SessionState, session_id: &str, summary: Option<SummaryId>) {
    if let Some(summary_id) = summary {
        METRICS.inc_summaries_created();
        let count = find_summary(state.summaries(), &summary_id).map_or(0, |s| s.events_count);
        obs::emit_summary_created(session_id, summary_id.as_str(), count);
    }
}

fn log_issue_change(session_id: &str, change: &IssueChange) {
    match change {
        IssueChange::Created {
            id,
            severity,
            reopens,
        } => obs::emit_issue_opened(
            session_id,
            id.as_str(),
            *severity,
            reopens.as_ref().map(|r| r.as_str()),
        ),
        IssueChange::Transitioned { id, from, to } => {
            obs::emit_issue_transition(session_id, id.as_str(), *from, *to)
        }
        IssueChange::Correlated { .. } | IssueChange::Unchanged => {}
    }
}
