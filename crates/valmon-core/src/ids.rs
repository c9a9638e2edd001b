//! Injected id generation.
//!
//! The engine never invents ids from wall-clock time or randomness on its
//! own: every event, summary and issue id comes from an [`IdGenerator`].
//! [`SequentialIds`] gives reproducible ids for tests and replay;
//! [`UuidIds`] gives globally unique ids for long-lived deployments.

/// What an id is being minted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Event,
    Summary,
    Issue,
}

impl IdKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Event => "evt",
            Self::Summary => "sum",
            Self::Issue => "issue",
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Event => 0,
            Self::Summary => 1,
            Self::Issue => 2,
        }
    }
}

/// Source of engine-assigned identifiers.
///
/// Implementations must not repeat an id for the same kind: the engine
/// skips ids a producer already used and asks again until one is free.
pub trait IdGenerator: Send {
    fn next_id(&mut self, kind: IdKind) -> String;
}

/// Monotonic per-kind counters: `evt-1`, `sum-1`, `issue-1`, ...
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    counters: [u64; 3],
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self, kind: IdKind) -> String {
        let counter = &mut self.counters[kind.slot()];
        *counter += 1;
        format!("{}-{}", kind.prefix(), counter)
    }
}

/// Random v4 UUIDs with a kind prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&mut self, kind: IdKind) -> String {
        format!("{}-{}", kind.prefix(), uuid::Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_per_kind() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(IdKind::Event), "evt-1");
        assert_eq!(ids.next_id(IdKind::Event), "evt-2");
        assert_eq!(ids.next_id(IdKind::Issue), "issue-1");
        assert_eq!(ids.next_id(IdKind::Summary), "sum-1");
        assert_eq!(ids.next_id(IdKind::Event), "evt-3");
    }

    #[test]
    fn sequential_ids_are_reproducible() {
        let mut a = SequentialIds::new();
        let mut b = SequentialIds::new();
        for kind in [IdKind::Event, IdKind::Issue, IdKind::Event, IdKind::Summary] {
            assert_eq!(a.next_id(kind), b.next_id(kind));
        }
    }

    #[test]
    fn uuid_ids_are_prefixed_and_unique() {
        let mut ids = UuidIds;
        let a = ids.next_id(IdKind::Issue);
        let b = ids.next_id(IdKind::Issue);
        assert!(a.starts_with("issue-"));
        assert_ne!(a, b);
    }
}
