//! Windowing and summarization.
//!
//! When the recent window overflows, everything but the newest
//! `keep_recent_events` is folded into one immutable [`EventSummary`].
//! Per-event detail is lost; counts, steps and the time range survive.

use crate::config::EngineConfig;
use crate::domain::{EventSummary, SummaryId, SummaryStats};
use crate::ids::{IdGenerator, IdKind};
use crate::session::SessionState;

/// Compact the oldest events of an overflowing window.
///
/// Returns the id of the new summary, or `None` when the window is within
/// bounds. Runs in O(n - k).
pub fn summarize(
    state: &mut SessionState,
    config: &EngineConfig,
    ids: &mut dyn IdGenerator,
) -> Option<SummaryId> {
    let n = state.recent_events.len();
    if n <= config.max_events_before_summarize {
        return None;
    }
    let cut = n - config.keep_recent_events.min(n);
    let stats = SummaryStats::from_events(&state.recent_events[..cut])?;

    let id = SummaryId(ids.next_id(IdKind::Summary));
    state.summaries.push(EventSummary {
        id: id.clone(),
        events_count: cut as u64,
        stats,
        collapsed: true,
    });
    state.recent_events.drain(..cut);
    Some(id)
}

/// Flip the `collapsed` flag of one summary.
///
/// Returns the new value, or `None` if the session has no such summary.
pub fn toggle_summary(state: &mut SessionState, summary_id: &SummaryId) -> Option<bool> {
    let summary = state.summaries.iter_mut().find(|s| &s.id == summary_id)?;
    summary.collapsed = !summary.collapsed;
    Some(summary.collapsed)
}

/// Collapse or expand every summary. Returns how many flags changed.
pub fn set_all_collapsed(state: &mut SessionState, collapsed: bool) -> usize {
    let mut changed = 0;
    for summary in state.summaries.iter_mut().filter(|s| s.collapsed != collapsed) {
        summary.collapsed = collapsed;
        changed += 1;
    }
    changed
}
