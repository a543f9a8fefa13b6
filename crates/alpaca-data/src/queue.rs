//! In-memory child fetcher.

use std::collections::{HashSet, VecDeque};

use alpaca_core::RequestId;

use crate::child::{ChildFetcher, ChildRequest, FetchError};

/// Fetcher that queues issued children for the embedding loop to run.
///
/// Identities are allocated from a counter starting at `first_id`.
#[derive(Debug)]
pub struct QueuedFetcher {
    next_id: u64,
    issued: VecDeque<ChildRequest>,
    refused: HashSet<String>,
    total_issued: usize,
}

impl QueuedFetcher {
    /// Create a fetcher allocating identities from `first_id` upwards.
    pub fn new(first_id: u64) -> Self {
        Self {
            next_id: first_id,
            issued: VecDeque::new(),
            refused: HashSet::new(),
            total_issued: 0,
        }
    }

    /// Refuse every future fetch of `uri`.
    pub fn refuse(mut self, uri: impl Into<String>) -> Self {
        self.refused.insert(uri.into());
        self
    }

    /// Take every child issued since the last drain, in issue order.
    pub fn drain(&mut self) -> Vec<ChildRequest> {
        self.issued.drain(..).collect()
    }

    /// Children issued but not yet drained.
    pub fn pending(&self) -> impl Iterator<Item = &ChildRequest> {
        self.issued.iter()
    }

    /// Children issued over the fetcher's lifetime.
    pub fn total_issued(&self) -> usize {
        self.total_issued
    }
}

impl Default for QueuedFetcher {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

impl ChildFetcher for QueuedFetcher {
    fn issue(&mut self, parent: RequestId, uri: &str) -> Result<RequestId, FetchError> {
        if self.refused.contains(uri) {
            return Err(FetchError::Refused {
                uri: uri.to_string(),
                reason: "refused by fetcher".to_string(),
            });
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.total_issued += 1;
        self.issued.push_back(ChildRequest {
            id,
            parent,
            uri: uri.to_string(),
        });
        Ok(id)
    }
}
