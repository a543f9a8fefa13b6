//! HTML page assembly flow and child capture.

use alpaca_core::{FilterPhase, RequestId};
use alpaca_data::{classify, ChildFetcher, ChildOutcome, FetchError};
use alpaca_executor::{Advance, IssueReport, PageAssembly, Progress};
use alpaca_morph::MorphEngine;
use alpaca_observability::RENDER_FAILURE_HINT;
use alpaca_streaming::{BodyChain, CaptureMode, ChunkOrigin, Downstream, Fragment};

use crate::context::RequestContext;
use crate::controller::FilterController;
use crate::error::FilterError;

impl<E, F, D> FilterController<E, F, D>
where
    E: MorphEngine,
    F: ChildFetcher,
    D: Downstream,
{
    /// Capture the page body without emitting anything until it is complete.
    pub(crate) fn page_body(
        &mut self,
        id: RequestId,
        mut ctx: RequestContext,
        mut chain: BodyChain,
    ) -> Result<(), FilterError> {
        match ctx.accumulator.append(&mut chain, CaptureMode::Suppress) {
            Ok(None) => {
                self.registry.restore(id, ctx);
                Ok(())
            }
            Ok(Some(body)) => self.start_assembly(id, ctx, body),
            Err(e) => {
                ctx.logger
                    .warn_builder("could not buffer page, passing it through")
                    .error(&e)
                    .field_u64("buffered", ctx.accumulator.len() as u64)
                    .emit();

                // Held bytes go out first, then the untouched chain.
                let mut out = BodyChain::new();
                if !ctx.accumulator.is_empty() {
                    out.push(Fragment {
                        data: ctx.accumulator.as_bytes().to_vec(),
                        end_of_body: false,
                        origin: ChunkOrigin::Pool,
                    });
                }
                out.extend(chain);
                self.downstream.forward(id, out)?;
                Ok(())
            }
        }
    }

    fn start_assembly(
        &mut self,
        id: RequestId,
        mut ctx: RequestContext,
        body: Vec<u8>,
    ) -> Result<(), FilterError> {
        let req = ctx.morph_request(body);
        let mut assembly = PageAssembly::new(id, req, ctx.config.css_inlining_enabled);

        let uris = assembly.discover(&mut self.engine);
        if uris.is_empty() {
            ctx.logger.debug("page references no objects");
            ctx.assembly = Some(assembly);
            return self.finalize_page(id, ctx);
        }

        let round = assembly.round();
        let report = assembly.issue(&mut self.fetcher, uris);
        ctx.assembly = Some(assembly);
        ctx.enter(FilterPhase::AwaitingChildren);
        self.record_issue(id, &mut ctx, &report, round.map(|r| r.name()));

        self.drive_page(id, ctx)
    }

    fn record_issue(
        &mut self,
        id: RequestId,
        ctx: &mut RequestContext,
        report: &IssueReport,
        round: Option<&'static str>,
    ) {
        for child in &report.issued {
            self.registry.link_child(child.id, id);
        }
        for refusal in &report.refused {
            ctx.logger
                .warn_builder("child fetch refused")
                .error(refusal)
                .emit();
        }
        if let Some(metrics) = ctx.metrics.as_mut() {
            metrics.record_round(report.issued.len(), report.refused.len());
        }
        ctx.logger
            .debug_builder("children issued")
            .field("round", round.unwrap_or("general"))
            .field_u64("issued", report.issued.len() as u64)
            .field_u64("refused", report.refused.len() as u64)
            .emit();
    }

    /// Advance a page whose round may be complete; park it otherwise.
    fn drive_page(&mut self, id: RequestId, mut ctx: RequestContext) -> Result<(), FilterError> {
        loop {
            let Some(assembly) = ctx.assembly.as_mut() else {
                return Ok(());
            };
            if !assembly.is_round_complete() {
                ctx.logger
                    .debug_builder("waiting for children")
                    .field_u64("completed", assembly.completed() as u64)
                    .field_u64("expected", assembly.expected() as u64)
                    .emit();
                self.registry.restore(id, ctx);
                return Ok(());
            }

            match assembly.advance(&mut self.engine, &mut self.fetcher) {
                Advance::NextRound(report) => {
                    self.record_issue(id, &mut ctx, &report, Some("general"));
                }
                Advance::Render => return self.finalize_page(id, ctx),
            }
        }
    }

    /// Render the page and emit its single final chunk.
    fn finalize_page(&mut self, id: RequestId, mut ctx: RequestContext) -> Result<(), FilterError> {
        ctx.enter(FilterPhase::Finalizing);
        let Some(mut assembly) = ctx.assembly.take() else {
            return Ok(());
        };

        let rendered = assembly.render(&mut self.engine);
        if rendered.fell_back {
            ctx.logger
                .error_builder(RENDER_FAILURE_HINT)
                .field("content_type", assembly.request().content_type.as_str())
                .emit();
        }
        if assembly.stats().css_inline_failed {
            ctx.logger.warn("stylesheet inlining failed, page kept its links");
        }

        let size = rendered.data.len();
        ctx.emitter
            .emit(&mut self.downstream, rendered.data, rendered.origin)?;
        ctx.enter(FilterPhase::Done);

        if let Some(mut metrics) = ctx.metrics.take() {
            let capture = ctx
                .timer
                .between(FilterPhase::Buffering, FilterPhase::AwaitingChildren)
                .or_else(|| ctx.timer.between(FilterPhase::Buffering, FilterPhase::Finalizing));
            let children_wait = ctx
                .timer
                .between(FilterPhase::AwaitingChildren, FilterPhase::Finalizing);
            metrics.record_phases(capture, children_wait);
            metrics.record_final(size, rendered.fell_back);
            let metrics = metrics.finalize();
            ctx.logger
                .info_builder("page assembled")
                .field_u64("rounds", u64::from(metrics.rounds))
                .field_u64("children_issued", metrics.children_issued as u64)
                .field_u64("children_refused", metrics.children_refused as u64)
                .field_u64("children_failed", metrics.children_failed as u64)
                .field_u64("captured_bytes", metrics.captured_bytes as u64)
                .field_u64("final_size", metrics.final_size as u64)
                .field_bool("render_fell_back", metrics.render_fell_back)
                .field_u64("capture_us", metrics.capture_us.unwrap_or(0))
                .field_u64("children_wait_us", metrics.children_wait_us.unwrap_or(0))
                .field_u64("duration_us", metrics.total_duration_us)
                .emit();
        }
        Ok(())
    }

    /// Capture a child's body; nothing of it is forwarded.
    pub(crate) fn child_body(
        &mut self,
        id: RequestId,
        mut ctx: RequestContext,
        mut chain: BodyChain,
    ) -> Result<(), FilterError> {
        let outcome = match ctx.accumulator.append(&mut chain, CaptureMode::Suppress) {
            Ok(None) => {
                self.registry.restore(id, ctx);
                return Ok(());
            }
            Ok(Some(body)) => classify(&ctx.head.uri, ctx.head.status, body),
            Err(e) => ChildOutcome::Failed(FetchError::Capture {
                uri: ctx.head.uri.clone(),
                reason: e.to_string(),
            }),
        };

        ctx.enter(FilterPhase::Finalizing);
        ctx.enter(FilterPhase::Done);
        if !chain.has_end_of_body() {
            self.registry.restore(id, ctx);
        }
        self.finish_child(id, outcome)
    }

    /// Hand a finished child to its page.
    pub(crate) fn finish_child(
        &mut self,
        child: RequestId,
        outcome: ChildOutcome,
    ) -> Result<(), FilterError> {
        let Some(page) = self.registry.unlink_child(child) else {
            return Ok(());
        };
        let Some(mut ctx) = self.registry.take(page) else {
            return Ok(());
        };

        let captured = match &outcome {
            ChildOutcome::Captured(body) => Some(body.len()),
            ChildOutcome::Failed(e) => {
                ctx.logger
                    .warn_builder("child fetch failed")
                    .field("child", child.to_string())
                    .error(e)
                    .emit();
                None
            }
        };

        let progress = ctx
            .assembly
            .as_mut()
            .and_then(|assembly| assembly.complete_child(child, outcome));

        match progress {
            Some(progress) => {
                if let Some(metrics) = ctx.metrics.as_mut() {
                    metrics.record_child(captured);
                }
                match progress {
                    Progress::RoundComplete => self.drive_page(page, ctx),
                    Progress::Pending => {
                        self.registry.restore(page, ctx);
                        Ok(())
                    }
                }
            }
            None => {
                self.registry.restore(page, ctx);
                Ok(())
            }
        }
    }
}
