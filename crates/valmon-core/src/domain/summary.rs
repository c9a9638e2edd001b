//! Immutable rollups of compacted events.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{EventStatus, ValidationEvent};

/// Per-status event counts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: u64,
    pub running: u64,
    pub passed: u64,
    pub failed: u64,
    pub corrected: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: EventStatus) {
        match status {
            EventStatus::Pending => self.pending += 1,
            EventStatus::Running => self.running += 1,
            EventStatus::Passed => self.passed += 1,
            EventStatus::Failed => self.failed += 1,
            EventStatus::Corrected => self.corrected += 1,
        }
    }

    pub fn get(&self, status: EventStatus) -> u64 {
        match status {
            EventStatus::Pending => self.pending,
            EventStatus::Running => self.running,
            EventStatus::Passed => self.passed,
            EventStatus::Failed => self.failed,
            EventStatus::Corrected => self.corrected,
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.running + self.passed + self.failed + self.corrected
    }
}

/// Inclusive time span covered by a summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aggregate statistics over a compacted block of events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub status_counts: StatusCounts,
    /// Distinct step labels; equality is by membership.
    pub steps: BTreeSet<String>,
    pub time_range: TimeRange,
}

impl SummaryStats {
    /// Fold a non-empty, chronologically ordered block of events.
    ///
    /// Returns `None` for an empty block.
    pub fn from_events(events: &[ValidationEvent]) -> Option<Self> {
        let first = events.first()?;
        let last = events.last()?;
        let mut status_counts = StatusCounts::default();
        let mut steps = BTreeSet::new();
        for event in events {
            status_counts.record(event.status);
            if !steps.contains(&event.step) {
                steps.insert(event.step.clone());
            }
        }
        Some(Self {
            status_counts,
            steps,
            time_range: TimeRange {
                start: first.timestamp,
                end: last.timestamp,
            },
        })
    }
}

/// Summary identifier assigned by the engine's id generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryId(pub String);

impl SummaryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SummaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rollup of a contiguous block of older events. Only `collapsed` ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: SummaryId,
    pub events_count: u64,
    pub stats: SummaryStats,
    pub collapsed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::EventId;

    fn event(id: &str, step: &str, status: EventStatus, ts: &str) -> ValidationEvent {
        ValidationEvent {
            id: EventId::new(id),
            session_id: "s".to_string(),
            step: step.to_string(),
            status,
            timestamp: ts.parse().expect("ts"),
            details: String::new(),
            related_issue_id: None,
            severity: None,
        }
    }

    #[test]
    fn test_stats_from_empty_block() {
        assert!(SummaryStats::from_events(&[]).is_none());
    }

    #[test]
    fn test_stats_counts_and_distinct_steps() {
        let events = vec![
            event("e1", "Lint Check", EventStatus::Passed, "2024-06-01T12:00:00Z"),
            event("e2", "Lint Check", EventStatus::Failed, "2024-06-01T12:00:01Z"),
            event("e3", "Security Validation", EventStatus::Passed, "2024-06-01T12:00:02Z"),
        ];
        let stats = SummaryStats::from_events(&events).expect("non-empty");
        assert_eq!(stats.status_counts.passed, 2);
        assert_eq!(stats.status_counts.failed, 1);
        assert_eq!(stats.status_counts.total(), 3);
        assert_eq!(stats.steps.len(), 2);
        assert_eq!(stats.time_range.start, events[0].timestamp);
        assert_eq!(stats.time_range.end, events[2].timestamp);
    }

    #[test]
    fn test_step_set_equality_ignores_insertion_order() {
        let a = vec![
            event("e1", "A", EventStatus::Passed, "2024-06-01T12:00:00Z"),
            event("e2", "B", EventStatus::Passed, "2024-06-01T12:00:01Z"),
        ];
        let b = vec![
            event("e1", "B", EventStatus::Passed, "2024-06-01T12:00:00Z"),
            event("e2", "A", EventStatus::Passed, "2024-06-01T12:00:01Z"),
        ];
        let sa = SummaryStats::from_events(&a).expect("a");
        let sb = SummaryStats::from_events(&b).expect("b");
        assert_eq!(sa.steps, sb.steps);
    }
}
