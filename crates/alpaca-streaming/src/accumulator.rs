//! Whole-body accumulation across body events.

use crate::chain::BodyChain;

/// What happens to the source fragments after they are copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Fragments keep their bytes and continue downstream.
    PassThrough,
    /// Fragments are emptied so the owning stage emits nothing.
    Suppress,
}

/// Accumulation errors. Callers fall back to pass-through on any of them.
#[derive(Debug, thiserror::Error)]
pub enum AccumulatorError {
    #[error("failed to allocate {requested} bytes for response body")]
    Allocation { requested: usize },

    #[error("response body of {size} bytes exceeds limit of {limit} bytes")]
    LimitExceeded { size: usize, limit: usize },

    #[error("body already complete")]
    Completed,
}

/// Rebuilds one response body from fragments delivered over many calls.
///
/// Storage only grows. When a body event would overflow the current
/// capacity the buffer is reallocated to `max(2 * capacity, needed)` and the
/// existing bytes are copied over.
#[derive(Debug)]
pub struct ResponseAccumulator {
    buffer: Vec<u8>,
    capacity: usize,
    limit: usize,
    complete: bool,
}

impl ResponseAccumulator {
    /// Accumulator with no preallocated storage.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            capacity: 0,
            limit: usize::MAX,
            complete: false,
        }
    }

    /// Accumulator starting at `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, AccumulatorError> {
        let mut acc = Self::new();
        acc.grow_to(capacity)?;
        Ok(acc)
    }

    /// Cap the total body size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Copy the fragments of `chain` into the body.
    ///
    /// Fragments after the one carrying the end-of-body flag are ignored.
    /// Returns an independent copy of the full body once the end-of-body
    /// flag is seen, `None` while the body is incomplete. On error neither
    /// the accumulator nor the chain is modified.
    pub fn append(
        &mut self,
        chain: &mut BodyChain,
        mode: CaptureMode,
    ) -> Result<Option<Vec<u8>>, AccumulatorError> {
        if self.complete {
            return Err(AccumulatorError::Completed);
        }

        let mut incoming = 0usize;
        for fragment in chain.fragments() {
            incoming = incoming.saturating_add(fragment.len());
            if fragment.end_of_body {
                break;
            }
        }

        let size = self.buffer.len().saturating_add(incoming);
        if size > self.limit {
            return Err(AccumulatorError::LimitExceeded {
                size,
                limit: self.limit,
            });
        }

        if size > self.capacity {
            let target = self.capacity.saturating_mul(2).max(size);
            self.grow_to(target)?;
        }

        let mut finished = false;
        for fragment in chain.fragments_mut() {
            match mode {
                CaptureMode::PassThrough => self.buffer.extend_from_slice(&fragment.data),
                CaptureMode::Suppress => {
                    let data = fragment.take_data();
                    self.buffer.extend_from_slice(&data);
                }
            }
            if fragment.end_of_body {
                finished = true;
                break;
            }
        }

        if finished {
            self.complete = true;
            return Ok(Some(self.buffer.clone()));
        }

        Ok(None)
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current storage capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the end-of-body flag has been seen.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Bytes accumulated so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the accumulator, returning the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn grow_to(&mut self, capacity: usize) -> Result<(), AccumulatorError> {
        if capacity <= self.capacity {
            return Ok(());
        }

        let mut grown = Vec::new();
        grown
            .try_reserve_exact(capacity)
            .map_err(|_| AccumulatorError::Allocation {
                requested: capacity,
            })?;
        grown.extend_from_slice(&self.buffer);

        self.buffer = grown;
        self.capacity = capacity;
        Ok(())
    }
}

impl Default for ResponseAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
