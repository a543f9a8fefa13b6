//! Filter state machine entry points.

use std::sync::Arc;

use alpaca_core::{
    FilterConfig, FilterLimits, FilterPhase, RequestId, RequestRole, ResponseHead,
    DEFAULT_HTML_CAPACITY, SENTINEL_CONTENT_TYPE,
};
use alpaca_data::{ChildFetcher, ChildOutcome, FetchError};
use alpaca_morph::MorphEngine;
use alpaca_streaming::{BodyChain, Downstream};
use http::StatusCode;

use crate::context::{RequestContext, RequestKind};
use crate::error::FilterError;
use crate::registry::RequestRegistry;

/// Outcome of a header event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Participation {
    /// The filter ignores this response; the head is untouched.
    PassThrough,
    /// The filter owns this response's body from now on.
    Intercepted,
}

/// Per-worker filter driven by the host's header and body events.
///
/// The controller is re-entered once per event and never blocks. All state
/// for a request is found through its identity in the registry, so any
/// interleaving of unrelated requests is safe.
pub struct FilterController<E, F, D> {
    pub(crate) engine: E,
    pub(crate) fetcher: F,
    pub(crate) downstream: D,
    pub(crate) registry: RequestRegistry,
    pub(crate) limits: FilterLimits,
}

impl<E, F, D> FilterController<E, F, D>
where
    E: MorphEngine,
    F: ChildFetcher,
    D: Downstream,
{
    /// Create a controller with default limits.
    pub fn new(engine: E, fetcher: F, downstream: D) -> Self {
        let limits = FilterLimits::default();
        Self {
            engine,
            fetcher,
            downstream,
            registry: RequestRegistry::new(limits.max_tracked_requests),
            limits,
        }
    }

    /// Set resource limits. Only call before the first event.
    pub fn with_limits(mut self, limits: FilterLimits) -> Self {
        self.registry = RequestRegistry::new(limits.max_tracked_requests);
        self.limits = limits;
        self
    }

    /// Handle a response header event.
    ///
    /// Intercepted heads lose their length, entity tag and range headers and
    /// are marked for in-memory buffering. Pass-through heads are left as
    /// they came.
    pub fn on_header(
        &mut self,
        id: RequestId,
        role: RequestRole,
        head: &mut ResponseHead,
        config: Arc<FilterConfig>,
    ) -> Participation {
        if let Some(page) = self.registry.page_of(id) {
            return self.admit_child(id, page, head, config);
        }
        if self.registry.is_orphan(id) {
            head.needs_in_memory = true;
            return Participation::Intercepted;
        }
        if role == RequestRole::Subrequest {
            return Participation::PassThrough;
        }

        let Some(kind) = classify_head(head, &config) else {
            return Participation::PassThrough;
        };

        let capacity = match kind {
            RequestKind::Page => head
                .content_length()
                .map(|len| usize::try_from(len).unwrap_or(usize::MAX))
                .unwrap_or(DEFAULT_HTML_CAPACITY)
                .min(self.limits.max_body_bytes),
            _ => 0,
        };

        let mut prepared = head.clone();
        if kind == RequestKind::Sentinel {
            prepared.status = StatusCode::OK;
            prepared.set_content_type(SENTINEL_CONTENT_TYPE);
        }
        prepared.strip_length_announcements();
        prepared.needs_in_memory = true;

        let mut ctx = match RequestContext::new(
            id,
            kind,
            prepared.clone(),
            config,
            capacity,
            self.limits.max_body_bytes,
        ) {
            Ok(ctx) => ctx,
            Err(e) => {
                tracing::warn!(
                    request_id = %id,
                    uri = %head.uri,
                    error = %e,
                    "could not allocate request context, passing response through"
                );
                return Participation::PassThrough;
            }
        };

        ctx.enter(match kind {
            RequestKind::Sentinel => FilterPhase::Finalizing,
            _ => FilterPhase::Buffering,
        });
        let mode = ctx.config.mode.name();

        if let Err(e) = self.registry.insert(id, ctx) {
            tracing::warn!(
                request_id = %id,
                uri = %head.uri,
                error = %e,
                "request not tracked, passing response through"
            );
            return Participation::PassThrough;
        }

        *head = prepared;
        tracing::debug!(
            request_id = %id,
            uri = %head.uri,
            kind = kind.name(),
            mode,
            capacity,
            "response intercepted"
        );
        Participation::Intercepted
    }

    /// Handle a body event.
    ///
    /// Errors are only returned when the downstream stage fails.
    pub fn on_body(&mut self, id: RequestId, chain: BodyChain) -> Result<(), FilterError> {
        if self.registry.is_orphan(id) {
            if chain.has_end_of_body() {
                self.registry.forget_orphan(id);
            }
            return Ok(());
        }
        let Some(ctx) = self.registry.take(id) else {
            self.downstream.forward(id, chain)?;
            return Ok(());
        };

        match ctx.phase {
            FilterPhase::Done | FilterPhase::AwaitingChildren => {
                self.swallow(id, ctx, &chain);
                Ok(())
            }
            _ => match ctx.kind {
                RequestKind::Sentinel => self.sentinel_body(id, ctx, chain),
                RequestKind::Leaf => self.leaf_body(id, ctx, chain),
                RequestKind::Page => self.page_body(id, ctx, chain),
                RequestKind::Child { .. } => self.child_body(id, ctx, chain),
            },
        }
    }

    /// Handle a request that ended before its body completed.
    ///
    /// An aborted child counts as a failed child of its page. The outstanding
    /// children of an aborted page are orphaned: whatever they still deliver
    /// is dropped.
    pub fn on_abort(&mut self, id: RequestId) -> Result<(), FilterError> {
        if self.registry.forget_orphan(id) {
            return Ok(());
        }
        if self.registry.page_of(id).is_some() {
            let uri = self
                .registry
                .take(id)
                .map(|ctx| ctx.head.uri)
                .unwrap_or_else(|| id.to_string());
            return self.finish_child(id, ChildOutcome::Failed(FetchError::Aborted { uri }));
        }

        let Some(ctx) = self.registry.take(id) else {
            return Ok(());
        };

        if let Some(assembly) = &ctx.assembly {
            for child in assembly.pending_children() {
                self.registry.orphan_child(child);
            }
        }
        ctx.logger
            .debug_builder("request aborted")
            .field("phase", ctx.phase.name())
            .emit();
        Ok(())
    }

    /// Current phase of a tracked request.
    pub fn phase(&self, id: RequestId) -> Option<FilterPhase> {
        self.registry.get(id).map(RequestContext::phase)
    }

    pub fn registry(&self) -> &RequestRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        &mut self.fetcher
    }

    pub fn downstream(&self) -> &D {
        &self.downstream
    }

    pub fn downstream_mut(&mut self) -> &mut D {
        &mut self.downstream
    }

    fn admit_child(
        &mut self,
        id: RequestId,
        page: RequestId,
        head: &mut ResponseHead,
        config: Arc<FilterConfig>,
    ) -> Participation {
        head.needs_in_memory = true;
        let kind = RequestKind::Child { page };
        let max_body_bytes = self.limits.max_body_bytes;
        let admitted = RequestContext::new(id, kind, head.clone(), config, 0, max_body_bytes)
            .map_err(|e| e.to_string())
            .and_then(|mut ctx| {
                ctx.enter(FilterPhase::Buffering);
                self.registry.insert(id, ctx).map_err(|e| e.to_string())
            });

        match admitted {
            Ok(()) => Participation::Intercepted,
            Err(reason) => {
                let outcome = ChildOutcome::Failed(FetchError::Capture {
                    uri: head.uri.clone(),
                    reason,
                });
                if let Err(e) = self.finish_child(id, outcome) {
                    tracing::error!(request_id = %page, error = %e, "failed to emit page");
                }
                // The body still belongs to the filter and is dropped.
                self.registry.orphan_child(id);
                Participation::Intercepted
            }
        }
    }

    /// Drop a body event of a request that is not accepting body bytes.
    ///
    /// A finished request is forgotten once its upstream body ends.
    fn swallow(&mut self, id: RequestId, ctx: RequestContext, chain: &BodyChain) {
        ctx.logger
            .debug_builder("body event swallowed")
            .field("phase", ctx.phase.name())
            .field_u64("bytes", chain.byte_len() as u64)
            .emit();

        if ctx.phase == FilterPhase::Done && chain.has_end_of_body() {
            return;
        }
        self.registry.restore(id, ctx);
    }
}

/// Which flow a top-level response follows, if any.
fn classify_head(head: &ResponseHead, config: &FilterConfig) -> Option<RequestKind> {
    if head.is_sentinel() {
        return (!head.query.is_empty()).then_some(RequestKind::Sentinel);
    }
    if !config.is_enabled() {
        return None;
    }
    if head.is_html() {
        return head.status.is_success().then_some(RequestKind::Page);
    }
    if head.is_paddable() && !head.query.is_empty() {
        return Some(RequestKind::Leaf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpaca_core::ScopeConfig;

    fn enabled() -> FilterConfig {
        ScopeConfig {
            deterministic: Some(true),
            obj_num: Some(1),
            obj_size: Some(10),
            max_obj_size: Some(100),
            ..Default::default()
        }
        .resolve()
        .unwrap()
    }

    #[test]
    fn test_classify_head() {
        let on = enabled();
        let off = FilterConfig::disabled();

        let page = ResponseHead::new("/").with_content_type("text/html");
        assert_eq!(classify_head(&page, &on), Some(RequestKind::Page));
        assert_eq!(classify_head(&page, &off), None);

        let missing = page.clone().with_status(StatusCode::NOT_FOUND);
        assert_eq!(classify_head(&missing, &on), None);

        let leaf = ResponseHead::new("/a.png").with_content_type("image/png");
        assert_eq!(classify_head(&leaf, &on), None);
        let leaf = leaf.with_query("alpaca-padding=100");
        assert_eq!(classify_head(&leaf, &on), Some(RequestKind::Leaf));

        let sentinel = ResponseHead::new("/__alpaca_fake_image.png")
            .with_status(StatusCode::NOT_FOUND)
            .with_query("alpaca-padding=5");
        assert_eq!(classify_head(&sentinel, &off), Some(RequestKind::Sentinel));
        let bare = ResponseHead::new("/__alpaca_fake_image.png");
        assert_eq!(classify_head(&bare, &on), None);

        let json = ResponseHead::new("/api").with_content_type("application/json");
        assert_eq!(classify_head(&json, &on), None);
    }
}
