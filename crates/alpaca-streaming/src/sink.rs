//! Downstream output stage.

use std::collections::HashMap;

use alpaca_core::RequestId;

use crate::chain::{BodyChain, ChunkOrigin, Fragment};

/// Errors raised by the output side.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("final chunk already emitted for {0}")]
    AlreadyCompleted(RequestId),

    #[error("downstream rejected body for {request}: {reason}")]
    Rejected { request: RequestId, reason: String },
}

/// The next body stage in the host pipeline.
pub trait Downstream {
    /// Pass a body chain on for `request`.
    fn forward(&mut self, request: RequestId, chain: BodyChain) -> Result<(), SinkError>;
}

/// State of a final emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitState {
    Open,
    Completed,
}

/// Guards the single final chunk of an intercepted request.
#[derive(Debug)]
pub struct FinalEmitter {
    request: RequestId,
    state: EmitState,
    emitted_bytes: usize,
}

impl FinalEmitter {
    pub fn new(request: RequestId) -> Self {
        Self {
            request,
            state: EmitState::Open,
            emitted_bytes: 0,
        }
    }

    /// Emit `data` as the final chunk.
    ///
    /// Fails without forwarding anything if a final chunk was already emitted.
    pub fn emit<D: Downstream + ?Sized>(
        &mut self,
        downstream: &mut D,
        data: Vec<u8>,
        origin: ChunkOrigin,
    ) -> Result<(), SinkError> {
        let chain = BodyChain::single(Fragment::final_chunk(data, origin));
        self.emit_chain(downstream, chain)
    }

    /// Emit a chain whose last fragment is the final chunk.
    pub fn emit_chain<D: Downstream + ?Sized>(
        &mut self,
        downstream: &mut D,
        chain: BodyChain,
    ) -> Result<(), SinkError> {
        if self.state == EmitState::Completed {
            return Err(SinkError::AlreadyCompleted(self.request));
        }

        // Marked before forwarding so a failing downstream cannot trigger a second emit.
        self.state = EmitState::Completed;
        self.emitted_bytes = chain.byte_len();
        downstream.forward(self.request, chain)
    }

    /// Whether the final chunk has been emitted.
    pub fn is_completed(&self) -> bool {
        self.state == EmitState::Completed
    }

    /// Size of the emitted final chain.
    pub fn emitted_bytes(&self) -> usize {
        self.emitted_bytes
    }
}

/// Downstream that records every forwarded chain per request.
#[derive(Debug, Default)]
pub struct CollectingDownstream {
    chains: HashMap<RequestId, Vec<BodyChain>>,
}

impl CollectingDownstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every chain forwarded for `request`, in order.
    pub fn chains(&self, request: RequestId) -> &[BodyChain] {
        self.chains
            .get(&request)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated body bytes forwarded for `request`.
    pub fn body_for(&self, request: RequestId) -> Vec<u8> {
        self.chains(request)
            .iter()
            .flat_map(|c| c.fragments())
            .flat_map(|f| f.data.iter().copied())
            .collect()
    }

    /// Fragments forwarded for `request` that carry the end-of-body flag.
    pub fn final_chunks(&self, request: RequestId) -> Vec<&Fragment> {
        self.chains(request)
            .iter()
            .flat_map(|c| c.fragments())
            .filter(|f| f.end_of_body)
            .collect()
    }

    /// Whether anything was forwarded for `request`.
    pub fn saw(&self, request: RequestId) -> bool {
        self.chains.contains_key(&request)
    }
}

impl Downstream for CollectingDownstream {
    fn forward(&mut self, request: RequestId, chain: BodyChain) -> Result<(), SinkError> {
        self.chains.entry(request).or_default().push(chain);
        Ok(())
    }
}
