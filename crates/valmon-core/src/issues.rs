//! Issue correlation and lifecycle tracking.
//!
//! Each validated event is folded into the [`IssueRegistry`] by
//! [`apply_to_issues`]. Rules, first match wins:
//! 1. a `failed` event joins the newest open issue of its category, or
//!    opens a new active issue (a reopen when only resolved ones exist),
//! 2. an event whose step carries a correction marker moves the newest active
//!    issue of its category to fixing,
//! 3. a `passed` event whose details carry a resolution marker resolves the
//!    newest active or fixing issue of its category,
//! 4. anything else leaves the registry untouched.
//!
//! Correlation is by normalized category and free-text markers. An event
//! carrying `related_issue_id` that names an open issue bypasses the
//! category lookup for rules 2 and 3.

use serde::{Deserialize, Serialize};

use crate::domain::{
    EventStatus, Issue, IssueId, IssueStatus, RejectedTransition, Severity, ValidationEvent,
};
use crate::ids::{IdGenerator, IdKind};

/// Step-label words that name the kind of stage rather than what it checks.
const STAGE_WORDS: &[&str] = &[
    "validation",
    "validations",
    "validator",
    "correction",
    "corrections",
    "check",
    "checks",
    "checker",
    "scan",
    "scanner",
    "analysis",
    "analyzer",
    "fix",
    "fixes",
    "autofix",
    "auto-fix",
    "review",
    "step",
];

/// Markers that make a category security-relevant.
pub const SECURITY_MARKERS: &[&str] = &["security", "vulnerab", "secret", "cve", "injection", "xss"];

/// Markers in a step label that identify a correction stage.
pub const CORRECTION_MARKERS: &[&str] = &["correction", "auto-fix", "autofix"];

/// Markers in event details that confirm a fix held.
pub const RESOLUTION_MARKERS: &[&str] = &["after correction", "after fix", "after auto-fix"];

fn contains_any(haystack: &str, markers: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    markers.iter().any(|m| lower.contains(m))
}

/// Normalize a step label into an issue category.
///
/// Stage words are dropped so that "Security Validation" and
/// "Security Correction" both land in `security`. A label made only of
/// stage words keeps all of its words.
pub fn derive_category(step: &str) -> String {
    let words: Vec<String> = step
        .split(|c: char| c.is_whitespace() || c == '_' || c == '/')
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    let subject: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| !STAGE_WORDS.contains(w))
        .collect();
    if subject.is_empty() {
        words.join("-")
    } else {
        subject.join("-")
    }
}

/// Whether the step label names a correction stage.
pub fn is_correction_step(step: &str) -> bool {
    contains_any(step, CORRECTION_MARKERS)
}

/// Whether a category is security-relevant and therefore critical.
pub fn category_implies_critical(category: &str) -> bool {
    contains_any(category, SECURITY_MARKERS)
}

/// Only the step label decides; a `corrected` status on another stage is
/// recorded but does not start a fix.
fn is_correction(event: &ValidationEvent) -> bool {
    is_correction_step(&event.step)
}

fn is_resolution(event: &ValidationEvent) -> bool {
    event.status == EventStatus::Passed && contains_any(&event.details, RESOLUTION_MARKERS)
}

/// Issue counts by lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub active: usize,
    pub fixing: usize,
    pub resolved: usize,
}

impl IssueCounts {
    pub fn total(&self) -> usize {
        self.active + self.fixing + self.resolved
    }

    pub fn open(&self) -> usize {
        self.active + self.fixing
    }
}

/// Issues of one session, kept in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueRegistry {
    issues: Vec<Issue>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &IssueId) -> Option<&Issue> {
        self.issues.iter().find(|i| &i.id == id)
    }

    fn get_mut(&mut self, id: &IssueId) -> Option<&mut Issue> {
        self.issues.iter_mut().find(|i| &i.id == id)
    }

    pub fn as_slice(&self) -> &[Issue] {
        &self.issues
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn counts(&self) -> IssueCounts {
        let mut counts = IssueCounts::default();
        for issue in &self.issues {
            match issue.status {
                IssueStatus::Active => counts.active += 1,
                IssueStatus::Fixing => counts.fixing += 1,
                IssueStatus::Resolved => counts.resolved += 1,
            }
        }
        counts
    }

    /// Newest issue of `category` whose status is one of `statuses`.
    ///
    /// Newest-first is the tie-break when malformed input left several
    /// open issues in one category.
    pub fn newest_in(&self, category: &str, statuses: &[IssueStatus]) -> Option<&Issue> {
        self.issues
            .iter()
            .rev()
            .find(|i| i.category == category && statuses.contains(&i.status))
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}

/// What a single event did to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueChange {
    Created {
        id: IssueId,
        severity: Severity,
        reopens: Option<IssueId>,
    },
    Correlated {
        id: IssueId,
    },
    Transitioned {
        id: IssueId,
        from: IssueStatus,
        to: IssueStatus,
    },
    Unchanged,
}

/// Severity for a new issue: security categories are always critical,
/// otherwise the producer's hint, otherwise `error`.
fn severity_for(category: &str, hint: Option<Severity>) -> Severity {
    if category_implies_critical(category) {
        Severity::Critical
    } else {
        hint.unwrap_or(Severity::Error)
    }
}

fn message_for(event: &ValidationEvent) -> String {
    if event.details.trim().is_empty() {
        format!("{} failed", event.step)
    } else {
        format!("{}: {}", event.step, event.details.trim())
    }
}

/// Resolve the issue an event explicitly points at, if it names an open one.
fn explicit_target(registry: &IssueRegistry, event: &ValidationEvent) -> Option<IssueId> {
    let wanted = event.related_issue_id.as_deref()?;
    registry
        .iter()
        .find(|i| i.id.as_str() == wanted && i.status.is_open())
        .map(|i| i.id.clone())
}

fn transition(
    registry: &mut IssueRegistry,
    id: &IssueId,
    to: IssueStatus,
    event: &ValidationEvent,
) -> Result<IssueChange, RejectedTransition> {
    let Some(issue) = registry.get_mut(id) else {
        return Ok(IssueChange::Unchanged);
    };
    let from = issue.status;
    issue.advance(to, event.id.clone(), event.timestamp)?;
    Ok(IssueChange::Transitioned {
        id: id.clone(),
        from,
        to,
    })
}

fn open_issue(
    registry: &mut IssueRegistry,
    event: &ValidationEvent,
    category: String,
    ids: &mut dyn IdGenerator,
) -> IssueChange {
    let reopens = registry
        .newest_in(&category, &[IssueStatus::Resolved])
        .map(|i| i.id.clone());
    let severity = severity_for(&category, event.severity);
    let id = IssueId(ids.next_id(IdKind::Issue));
    registry.issues.push(Issue {
        id: id.clone(),
        severity,
        category,
        message: message_for(event),
        first_seen_at: event.timestamp,
        updated_at: event.timestamp,
        status: IssueStatus::Active,
        correlated_event_ids: vec![event.id.clone()],
        reopens: reopens.clone(),
    });
    IssueChange::Created {
        id,
        severity,
        reopens,
    }
}

/// Fold one event into the issue registry.
///
/// # Errors
///
/// Returns the refused transition if a rule tried to move an issue
/// backwards. The rules never ask for that, so an error here is an engine
/// defect, not bad input.
pub fn apply_to_issues(
    registry: &mut IssueRegistry,
    event: &ValidationEvent,
    ids: &mut dyn IdGenerator,
) -> Result<IssueChange, RejectedTransition> {
    let category = derive_category(&event.step);

    if event.status == EventStatus::Failed {
        let open = registry
            .newest_in(&category, &[IssueStatus::Active, IssueStatus::Fixing])
            .map(|i| i.id.clone());
        if let Some(id) = open {
            if let Some(issue) = registry.get_mut(&id) {
                issue.correlate(event.id.clone(), event.timestamp);
            }
            return Ok(IssueChange::Correlated { id });
        }
        return Ok(open_issue(registry, event, category, ids));
    }

    let explicit = explicit_target(registry, event);

    if is_correction(event) {
        let target = match &explicit {
            Some(id) => registry
                .get(id)
                .filter(|i| i.status == IssueStatus::Active)
                .map(|i| i.id.clone()),
            None => registry
                .newest_in(&category, &[IssueStatus::Active])
                .map(|i| i.id.clone()),
        };
        if let Some(id) = target {
            return transition(registry, &id, IssueStatus::Fixing, event);
        }
    }

    if is_resolution(event) {
        let target = explicit.or_else(|| {
            registry
                .newest_in(&category, &[IssueStatus::Active, IssueStatus::Fixing])
                .map(|i| i.id.clone())
        });
        if let Some(id) = target {
            return transition(registry, &id, IssueStatus::Resolved, event);
        }
    }

    Ok(IssueChange::Unchanged)
}
