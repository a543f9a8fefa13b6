//! Per-request filter state.

use std::sync::Arc;

use alpaca_core::{FilterConfig, FilterPhase, PhaseTimer, RequestId, RequestRole, ResponseHead};
use alpaca_executor::PageAssembly;
use alpaca_morph::MorphRequest;
use alpaca_observability::{FilterLogger, MetricsCollector};
use alpaca_streaming::{AccumulatorError, FinalEmitter, ResponseAccumulator};

/// Which interception flow a request follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Synthetic padding object.
    Sentinel,
    /// Paddable leaf object carrying a padding request.
    Leaf,
    /// Top-level HTML page.
    Page,
    /// Child fetch issued by `page`.
    Child { page: RequestId },
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Sentinel => "sentinel",
            RequestKind::Leaf => "leaf",
            RequestKind::Page => "page",
            RequestKind::Child { .. } => "child",
        }
    }

    pub fn role(self) -> RequestRole {
        match self {
            RequestKind::Child { .. } => RequestRole::Subrequest,
            _ => RequestRole::TopLevel,
        }
    }
}

/// State of one intercepted request.
#[derive(Debug)]
pub struct RequestContext {
    pub(crate) kind: RequestKind,
    pub(crate) phase: FilterPhase,
    pub(crate) head: ResponseHead,
    pub(crate) config: Arc<FilterConfig>,
    pub(crate) accumulator: ResponseAccumulator,
    pub(crate) emitter: FinalEmitter,
    pub(crate) logger: FilterLogger,
    pub(crate) timer: PhaseTimer,
    pub(crate) assembly: Option<PageAssembly>,
    pub(crate) metrics: Option<MetricsCollector>,
}

impl RequestContext {
    /// Allocate the context and its accumulation storage.
    pub fn new(
        id: RequestId,
        kind: RequestKind,
        head: ResponseHead,
        config: Arc<FilterConfig>,
        capacity: usize,
        max_body_bytes: usize,
    ) -> Result<Self, AccumulatorError> {
        let accumulator = ResponseAccumulator::with_capacity(capacity)?.with_limit(max_body_bytes);

        let mut logger = FilterLogger::new(id, head.uri.clone());
        if let RequestKind::Child { page } = kind {
            logger = logger.with_page(page);
        }

        let metrics = match kind {
            RequestKind::Page => Some(MetricsCollector::new(id, head.uri.clone())),
            _ => None,
        };

        Ok(Self {
            kind,
            phase: FilterPhase::Inactive,
            head,
            config,
            accumulator,
            emitter: FinalEmitter::new(id),
            logger,
            timer: PhaseTimer::new(),
            assembly: None,
            metrics,
        })
    }

    /// Move to `next`, logging transitions the lifecycle does not allow.
    pub(crate) fn enter(&mut self, next: FilterPhase) {
        if !self.phase.can_advance_to(next) {
            self.logger
                .warn_builder("unexpected phase transition")
                .field("from", self.phase.name())
                .field("to", next.name())
                .emit();
        }
        self.phase = next;
        self.timer.mark(next);
    }

    /// Request for the engine carrying `content` and this request's parameters.
    pub(crate) fn morph_request(&self, content: Vec<u8>) -> MorphRequest {
        MorphRequest::from_head(&self.head, &self.config, content)
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn phase(&self) -> FilterPhase {
        self.phase
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn is_child(&self) -> bool {
        matches!(self.kind, RequestKind::Child { .. })
    }

    /// Bytes accumulated so far.
    pub fn buffered_bytes(&self) -> usize {
        self.accumulator.len()
    }

    /// Storage reserved for accumulation.
    pub fn buffer_capacity(&self) -> usize {
        self.accumulator.capacity()
    }

    /// Page assembly, for pages past body completion.
    pub fn assembly(&self) -> Option<&PageAssembly> {
        self.assembly.as_ref()
    }
}
