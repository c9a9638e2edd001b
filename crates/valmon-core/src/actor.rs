//! Turn resolution: which party is expected to act next.
//!
//! Derived from the recent window alone, so replaying the same events
//! always yields the same actor.

use serde::{Deserialize, Serialize};

use crate::domain::{EventId, EventStatus, ValidationEvent};
use crate::issues::is_correction_step;

/// Party expected to act next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The validation pipeline is running or about to run.
    System,
    /// The assistant is correcting, or is expected to correct, a failure.
    Ai,
    /// A human decision is pending.
    User,
    /// Nothing has happened yet.
    Idle,
}

/// The resolved actor and the event it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorResolution {
    pub actor: Actor,
    pub based_on: Option<EventId>,
}

impl ActorResolution {
    pub fn idle() -> Self {
        Self {
            actor: Actor::Idle,
            based_on: None,
        }
    }
}

impl Default for ActorResolution {
    fn default() -> Self {
        Self::idle()
    }
}

/// Phrases in a step label or detail text that hand the turn to a human.
pub const USER_DECISION_MARKERS: &[&str] = &[
    "awaiting user",
    "user decision",
    "user approval",
    "user input",
    "requires approval",
    "manual review",
    "needs confirmation",
];

fn awaits_user(event: &ValidationEvent) -> bool {
    let step = event.step.to_lowercase();
    let details = event.details.to_lowercase();
    USER_DECISION_MARKERS
        .iter()
        .any(|m| step.contains(m) || details.contains(m))
}

/// Map a single event to the actor it hands the turn to.
pub fn actor_for(event: &ValidationEvent) -> Actor {
    if awaits_user(event) {
        return Actor::User;
    }
    if is_correction_step(&event.step) {
        return Actor::Ai;
    }
    match event.status {
        EventStatus::Failed | EventStatus::Corrected => Actor::Ai,
        EventStatus::Pending | EventStatus::Running | EventStatus::Passed => Actor::System,
    }
}

/// Resolve the current actor from the most recent event.
pub fn resolve_actor(recent: &[ValidationEvent]) -> ActorResolution {
    match recent.last() {
        None => ActorResolution::idle(),
        Some(event) => ActorResolution {
            actor: actor_for(event),
            based_on: Some(event.id.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, step: &str, status: EventStatus, details: &str) -> ValidationEvent {
        ValidationEvent {
            id: EventId::new(id),
            session_id: "s".to_string(),
            step: step.to_string(),
            status,
            timestamp: "2024-06-01T12:00:00Z".parse().expect("ts"),
            details: details.to_string(),
            related_issue_id: None,
            severity: None,
        }
    }

    #[test]
    fn test_empty_window_is_idle() {
        let resolution = resolve_actor(&[]);
        assert_eq!(resolution.actor, Actor::Idle);
        assert!(resolution.based_on.is_none());
    }

    #[test]
    fn test_running_validation_is_system() {
        let events = vec![event("e1", "Static Analysis", EventStatus::Running, "")];
        let resolution = resolve_actor(&events);
        assert_eq!(resolution.actor, Actor::System);
        assert_eq!(resolution.based_on, Some(EventId::new("e1")));
    }

    #[test]
    fn test_failure_hands_turn_to_ai() {
        let events = vec![
            event("e1", "Lint Check", EventStatus::Passed, ""),
            event("e2", "Security Validation", EventStatus::Failed, "hardcoded secret"),
        ];
        assert_eq!(resolve_actor(&events).actor, Actor::Ai);
    }

    #[test]
    fn test_correction_step_is_ai_even_while_running() {
        let events = vec![event("e1", "Proactive Correction", EventStatus::Running, "")];
        assert_eq!(resolve_actor(&events).actor, Actor::Ai);
    }

    #[test]
    fn test_user_marker_wins() {
        let events = vec![event(
            "e1",
            "Security Correction",
            EventStatus::Pending,
            "Awaiting user approval for dependency upgrade",
        )];
        assert_eq!(resolve_actor(&events).actor, Actor::User);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let events = vec![
            event("e1", "Lint Check", EventStatus::Failed, ""),
            event("e2", "Lint Correction", EventStatus::Corrected, ""),
        ];
        assert_eq!(resolve_actor(&events), resolve_actor(&events));
    }
}
