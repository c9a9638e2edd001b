//! Engine-wide properties checked over generated event sequences.

use std::collections::HashMap;

use proptest::prelude::*;
use proptest::sample::select;
use valmon_core::{
    EngineConfig, EngineError, HealthStatus, IssueStatus, MalformedEventError, MonitorEngine,
    RawEvent, SequentialIds, SessionView, Severity,
};

const STEPS: &[&str] = &[
    "Security Validation",
    "Security Correction",
    "Lint Check",
    "Lint Correction",
    "Type Check",
    "Static Analysis",
];
const STATUSES: &[&str] = &["pending", "running", "passed", "failed", "corrected"];
const DETAILS: &[&str] = &["", "passed after correction", "clean after fix", "flaky"];

/// One generated step outcome, before ids and timestamps are assigned.
#[derive(Debug, Clone)]
struct Draw {
    step: &'static str,
    status: &'static str,
    details: &'static str,
}

fn draw_strategy() -> impl Strategy<Value = Draw> {
    (select(STEPS), select(STATUSES), select(DETAILS)).prop_map(|(step, status, details)| Draw {
        step,
        status,
        details,
    })
}

/// Producer-numbered events one second apart, ids `e0`, `e1`, ...
fn events_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<RawEvent>> {
    proptest::collection::vec(draw_strategy(), len).prop_map(materialize)
}

/// `(max_events_before_summarize, keep_recent_events)` with `keep <= max`.
fn config_strategy() -> impl Strategy<Value = (usize, usize)> {
    (1usize..=40).prop_flat_map(|max| (Just(max), 0..=max))
}

fn timestamp(n: usize) -> String {
    format!(
        "2024-06-01T{:02}:{:02}:{:02}Z",
        10 + n / 3600,
        (n / 60) % 60,
        n % 60
    )
}

fn materialize(draws: Vec<Draw>) -> Vec<RawEvent> {
    draws
        .into_iter()
        .enumerate()
        .map(|(n, d)| {
            RawEvent::new("s", d.step, d.status, timestamp(n))
                .with_id(format!("e{n}"))
                .with_details(d.details)
        })
        .collect()
}

/// Deterministic sequence for the plain tests below.
fn fixed(len: usize) -> Vec<RawEvent> {
    let draws = (0..len)
        .map(|n| Draw {
            step: STEPS[n % STEPS.len()],
            status: STATUSES[(n * 3) % STATUSES.len()],
            details: DETAILS[n % DETAILS.len()],
        })
        .collect();
    materialize(draws)
}

fn engine(max: usize, keep: usize) -> MonitorEngine {
    MonitorEngine::with_id_generator(EngineConfig::new(max, keep), Box::new(SequentialIds::new()))
        .expect("engine")
}

fn summarized(view: &SessionView) -> u64 {
    view.summaries.iter().map(|s| s.events_count).sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn count_conservation_and_bounded_window_hold_after_every_event(
        (max, keep) in config_strategy(),
        raws in events_strategy(0..200),
    ) {
        let mut engine = engine(max, keep);
        for (n, raw) in raws.into_iter().enumerate() {
            let view = engine.apply_event("s", raw).expect("apply");
            prop_assert_eq!(
                view.recent_events.len() as u64 + summarized(&view),
                (n + 1) as u64
            );
            prop_assert_eq!(view.total_event_count, (n + 1) as u64);
            prop_assert!(view.recent_events.len() <= max);
        }
        prop_assert!(engine.violations().is_empty());
    }

    #[test]
    fn batch_delivery_conserves_counts(
        (max, keep) in config_strategy(),
        raws in events_strategy(1..200),
    ) {
        let len = raws.len() as u64;
        let mut engine = engine(max, keep);
        let report = engine.apply_events("s", raws).expect("batch");
        prop_assert!(report.rejected.is_empty());
        prop_assert_eq!(report.view.total_event_count, len);
        prop_assert_eq!(
            report.view.recent_events.len() as u64 + summarized(&report.view),
            len
        );
        prop_assert!(report.view.recent_events.len() <= max);
        prop_assert!(report.view.summaries.len() <= 1);
    }

    #[test]
    fn stamped_events_are_never_dropped(
        (max, keep) in config_strategy(),
        draws in proptest::collection::vec((draw_strategy(), any::<bool>()), 1..100),
    ) {
        // Producer ids deliberately share the engine's `evt-N` shape.
        let len = draws.len() as u64;
        let mut engine = engine(max, keep);
        let mut last = None;
        for (n, (d, stamped)) in draws.into_iter().enumerate() {
            let mut raw = RawEvent::new("s", d.step, d.status, timestamp(n)).with_details(d.details);
            if !stamped {
                raw = raw.with_id(format!("evt-{}", n + 1));
            }
            last = Some(engine.apply_event("s", raw).expect("apply"));
        }
        let view = last.expect("view");
        prop_assert_eq!(view.total_event_count, len);
    }

    #[test]
    fn issue_status_never_moves_backwards(raws in events_strategy(0..300)) {
        let mut engine = engine(30, 15);
        let mut last_rank = HashMap::new();
        for raw in raws {
            let view = engine.apply_event("s", raw).expect("apply");
            for issue in &view.issues {
                let now = issue.status.rank();
                let before = last_rank.insert(issue.id.clone(), now).unwrap_or(0);
                prop_assert!(now >= before, "issue {} moved backwards", issue.id);
            }
        }
    }

    #[test]
    fn critical_health_iff_active_critical_issue(raws in events_strategy(0..300)) {
        let mut engine = engine(30, 15);
        for raw in raws {
            let view = engine.apply_event("s", raw).expect("apply");
            let critical_active = view
                .issues
                .iter()
                .any(|i| i.status == IssueStatus::Active && i.severity == Severity::Critical);
            prop_assert_eq!(view.health_status == HealthStatus::Critical, critical_active);
        }
    }

    #[test]
    fn duplicate_ids_are_idempotent(raws in events_strategy(1..60), replays in 1usize..10) {
        let mut engine = engine(30, 15);
        for raw in raws.iter().cloned() {
            engine.apply_event("s", raw).expect("apply");
        }
        let before = engine.view("s").expect("view");
        for raw in raws.into_iter().rev().take(replays) {
            let view = engine.apply_event("s", raw).expect("replay");
            prop_assert_eq!(&view, &before);
        }
    }

    #[test]
    fn toggle_twice_restores_view(raws in events_strategy(5..40)) {
        let mut engine = engine(4, 2);
        for raw in raws {
            engine.apply_event("s", raw).expect("apply");
        }
        let before = engine.view("s").expect("view");
        let summary_id = before.summaries[0].id.as_str().to_string();

        let toggled = engine.toggle_summary("s", &summary_id).expect("toggle");
        prop_assert!(!toggled.summaries[0].collapsed);
        prop_assert_eq!(&toggled.recent_events, &before.recent_events);
        prop_assert_eq!(&toggled.issues, &before.issues);

        let restored = engine.toggle_summary("s", &summary_id).expect("toggle back");
        prop_assert_eq!(restored, before);
    }

    #[test]
    fn set_all_collapsed_expands_every_summary(raws in events_strategy(5..60)) {
        let mut engine = engine(4, 2);
        for raw in raws {
            engine.apply_event("s", raw).expect("apply");
        }
        let count = engine.view("s").expect("view").summaries.len();
        prop_assert!(count >= 1);
        prop_assert_eq!(engine.set_all_collapsed("s", false).expect("expand"), count);
        let view = engine.view("s").expect("view");
        prop_assert!(view.summaries.iter().all(|s| !s.collapsed));
    }

    #[test]
    fn replay_yields_identical_digest(raws in events_strategy(1..80)) {
        let run = |raws: Vec<RawEvent>| {
            let mut engine = engine(10, 4);
            for raw in raws {
                engine.apply_event("s", raw).expect("apply");
            }
            engine.view("s").expect("view").digest().expect("digest")
        };
        let first = run(raws.clone());
        prop_assert_eq!(first.len(), 64);
        prop_assert_eq!(first, run(raws));
    }

    #[test]
    fn malformed_event_leaves_session_untouched(raws in events_strategy(1..30)) {
        let mut engine = engine(30, 15);
        for raw in raws {
            engine.apply_event("s", raw).expect("apply");
        }
        let before = engine.view("s").expect("view");

        let bad = RawEvent::new("s", "Lint Check", "passed", "yesterday").with_id("bad-1");
        let err = engine.apply_event("s", bad).expect_err("malformed");
        prop_assert!(matches!(
            err,
            EngineError::Malformed(MalformedEventError::InvalidTimestamp { .. })
        ), "expected InvalidTimestamp, got {:?}", err);
        prop_assert_eq!(engine.view("s").expect("view"), before);
    }
}

#[test]
fn unknown_session_and_summary_are_reported() {
    let mut engine = engine(30, 15);
    assert!(matches!(
        engine.view("missing"),
        Err(EngineError::UnknownSession(id)) if id == "missing"
    ));
    assert!(matches!(
        engine.toggle_summary("missing", "sum-1"),
        Err(EngineError::UnknownSession(_))
    ));
    engine.apply_event("s", fixed(1).remove(0)).expect("apply");
    assert!(matches!(
        engine.toggle_summary("s", "sum-1"),
        Err(EngineError::UnknownSummary { .. })
    ));
}

#[test]
fn close_session_discards_state() {
    let mut engine = engine(30, 15);
    for raw in fixed(5) {
        engine.apply_event("s", raw).expect("apply");
    }
    let last = engine.close_session("s").expect("close");
    assert_eq!(last.total_event_count, 5);
    assert!(engine.session_ids().is_empty());

    let fresh = engine
        .apply_event("s", fixed(1).remove(0))
        .expect("reopen session");
    assert_eq!(fresh.total_event_count, 1);
}
