//! Event ingestion buffer.
//!
//! Appends validated events to a session's recent window in arrival order,
//! drops duplicate ids, and hands overflow to the windowing engine.

use std::collections::{HashSet, VecDeque};

use crate::config::EngineConfig;
use crate::domain::{EventId, SummaryId, ValidationEvent};
use crate::ids::IdGenerator;
use crate::session::SessionState;
use crate::windowing;

/// Bounded memory of recently seen event ids.
///
/// Ids still in the recent window are always caught; this window extends
/// duplicate detection to ids that were already compacted into a summary.
#[derive(Debug, Clone, Default)]
pub struct DedupeWindow {
    order: VecDeque<EventId>,
    members: HashSet<EventId>,
}

impl DedupeWindow {
    pub fn contains(&self, id: &EventId) -> bool {
        self.members.contains(id)
    }

    /// Remember `id`, evicting the oldest entries beyond `capacity`.
    pub fn remember(&mut self, id: EventId, capacity: usize) {
        if capacity == 0 || !self.members.insert(id.clone()) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Result of an [`append`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended {
        /// Summary created because the window overflowed.
        summary: Option<SummaryId>,
        /// The event is older than one already applied. It is kept in
        /// arrival order; reordering is the transport's job.
        out_of_order: bool,
    },
    Duplicate,
}

/// Result of an [`append_batch`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchAppend {
    /// Events actually added, in arrival order.
    pub appended: Vec<EventId>,
    pub duplicates: Vec<EventId>,
    pub out_of_order: Vec<EventId>,
    pub summary: Option<SummaryId>,
}

pub(crate) fn is_duplicate(state: &SessionState, id: &EventId) -> bool {
    state.seen.contains(id) || state.recent_events.iter().any(|e| &e.id == id)
}

/// Push one event without summarizing. `None` for a duplicate, otherwise
/// whether the event arrived out of timestamp order.
fn push(state: &mut SessionState, event: ValidationEvent, config: &EngineConfig) -> Option<bool> {
    if is_duplicate(state, &event.id) {
        return None;
    }

    let out_of_order = state
        .last_timestamp
        .is_some_and(|last| event.timestamp < last);
    if !out_of_order {
        state.last_timestamp = Some(event.timestamp);
    }

    state.seen.remember(event.id.clone(), config.dedupe_window);
    state.recent_events.push(event);
    state.total_events += 1;
    Some(out_of_order)
}

fn summarize_if_needed(
    state: &mut SessionState,
    config: &EngineConfig,
    ids: &mut dyn IdGenerator,
) -> Option<SummaryId> {
    if state.recent_events.len() > config.max_events_before_summarize {
        windowing::summarize(state, config, ids)
    } else {
        None
    }
}

/// Append an event, summarizing if the window overflows.
///
/// On return `recent_events.len() <= max_events_before_summarize`.
pub fn append(
    state: &mut SessionState,
    event: ValidationEvent,
    config: &EngineConfig,
    ids: &mut dyn IdGenerator,
) -> AppendOutcome {
    match push(state, event, config) {
        None => AppendOutcome::Duplicate,
        Some(out_of_order) => AppendOutcome::Appended {
            summary: summarize_if_needed(state, config, ids),
            out_of_order,
        },
    }
}

/// Append a whole delivery, then summarize at most once.
///
/// A backlog delivered in one piece is compacted into a single summary
/// instead of one per overflow. The window bound holds on return.
pub fn append_batch(
    state: &mut SessionState,
    events: Vec<ValidationEvent>,
    config: &EngineConfig,
    ids: &mut dyn IdGenerator,
) -> BatchAppend {
    let mut batch = BatchAppend::default();
    for event in events {
        let id = event.id.clone();
        match push(state, event, config) {
            None => batch.duplicates.push(id),
            Some(out_of_order) => {
                if out_of_order {
                    batch.out_of_order.push(id.clone());
                }
                batch.appended.push(id);
            }
        }
    }
    batch.summary = summarize_if_needed(state, config, ids);
    batch
}
