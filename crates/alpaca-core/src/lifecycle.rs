//! Per-request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases of an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterPhase {
    /// The filter does not participate; events pass through.
    Inactive,
    /// Body fragments are being accumulated.
    Buffering,
    /// Child fetches of a page are outstanding.
    AwaitingChildren,
    /// The final chunk is being produced.
    Finalizing,
    /// Exactly one final chunk has been emitted.
    Done,
}

impl FilterPhase {
    /// Whether moving to `next` is a legal transition.
    pub fn can_advance_to(self, next: FilterPhase) -> bool {
        use FilterPhase::*;
        matches!(
            (self, next),
            (Inactive, Buffering)
                | (Inactive, Finalizing)
                | (Buffering, AwaitingChildren)
                | (Buffering, Finalizing)
                | (AwaitingChildren, Finalizing)
                | (Finalizing, Done)
        )
    }

    /// Phase name for logs.
    pub fn name(self) -> &'static str {
        match self {
            FilterPhase::Inactive => "inactive",
            FilterPhase::Buffering => "buffering",
            FilterPhase::AwaitingChildren => "awaiting_children",
            FilterPhase::Finalizing => "finalizing",
            FilterPhase::Done => "done",
        }
    }
}

impl std::fmt::Display for FilterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Records when each phase was first entered.
#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    marks: HashMap<FilterPhase, Instant>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record entry into `phase`. Re-entering keeps the first mark.
    pub fn mark(&mut self, phase: FilterPhase) {
        self.marks.entry(phase).or_insert_with(Instant::now);
    }

    /// Time spent between entering `from` and entering `to`.
    pub fn between(&self, from: FilterPhase, to: FilterPhase) -> Option<Duration> {
        let from = self.marks.get(&from)?;
        let to = self.marks.get(&to)?;
        to.checked_duration_since(*from)
    }
}
