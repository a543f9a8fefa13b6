//! Discovery round accounting.

use std::collections::HashMap;

use alpaca_core::RequestId;

/// Which reference list a round fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryRound {
    /// Stylesheets, fetched for inlining.
    Css,
    /// Every embeddable object.
    General,
}

impl DiscoveryRound {
    pub fn name(self) -> &'static str {
        match self {
            DiscoveryRound::Css => "css",
            DiscoveryRound::General => "general",
        }
    }
}

/// Tracks the children of one round.
///
/// Every issued child counts once toward `completed`, whether it succeeded,
/// failed or was refused at issue time.
#[derive(Debug, Default)]
pub struct RoundTracker {
    expected: usize,
    completed: usize,
    pending: HashMap<RequestId, String>,
}

impl RoundTracker {
    /// Start a round expecting `expected` completions.
    pub fn start(expected: usize) -> Self {
        Self {
            expected,
            completed: 0,
            pending: HashMap::with_capacity(expected),
        }
    }

    /// Record an issued child.
    pub fn track(&mut self, child: RequestId, uri: impl Into<String>) {
        self.pending.insert(child, uri.into());
    }

    /// Count a child that never got issued.
    pub fn count_refused(&mut self) {
        self.completed += 1;
    }

    /// Count a finished child, returning its URI. Unknown children are ignored.
    pub fn finish(&mut self, child: RequestId) -> Option<String> {
        let uri = self.pending.remove(&child)?;
        self.completed += 1;
        Some(uri)
    }

    /// Outstanding children.
    pub fn pending(&self) -> impl Iterator<Item = RequestId> + '_ {
        self.pending.keys().copied()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Whether every expected child has been counted.
    pub fn is_complete(&self) -> bool {
        self.completed >= self.expected
    }
}
