//! Sentinel and paddable-leaf flows.

use alpaca_core::{FilterPhase, RequestId};
use alpaca_data::ChildFetcher;
use alpaca_morph::{Morph, MorphEngine};
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
    /// Replace the sentinel body with a synthetic object.
    ///
    /// The object is emitted on the first body event; the rest of the
    /// upstream body is swallowed. If no object can be made the response ends
    /// with an empty body, since its head already announces an image.
    pub(crate) fn sentinel_body(
        &mut self,
        id: RequestId,
        mut ctx: RequestContext,
        chain: BodyChain,
    ) -> Result<(), FilterError> {
        let mut req = ctx.morph_request(Vec::new());

        if Morph::new(&mut self.engine).make_object(&mut req) {
            let size = req.size();
            ctx.emitter
                .emit(&mut self.downstream, req.content, ChunkOrigin::Engine)?;
            ctx.logger
                .debug_builder("padding object emitted")
                .field_u64("size", size as u64)
                .emit();
        } else {
            ctx.logger
                .warn_builder("could not synthesize padding object")
                .field("query", ctx.head.query.as_str())
                .emit();
            ctx.emitter
                .emit(&mut self.downstream, Vec::new(), ChunkOrigin::Pool)?;
        }
        ctx.enter(FilterPhase::Done);

        if !chain.has_end_of_body() {
            self.registry.restore(id, ctx);
        }
        Ok(())
    }

    /// Forward a leaf object as it arrives and append its padding at the end.
    pub(crate) fn leaf_body(
        &mut self,
        id: RequestId,
        mut ctx: RequestContext,
        mut chain: BodyChain,
    ) -> Result<(), FilterError> {
        let body = match ctx.accumulator.append(&mut chain, CaptureMode::PassThrough) {
            Ok(Some(body)) => body,
            Ok(None) => {
                self.downstream.forward(id, chain)?;
                self.registry.restore(id, ctx);
                return Ok(());
            }
            Err(e) => {
                ctx.logger
                    .warn_builder("could not buffer object, passing it through")
                    .error(&e)
                    .emit();
                self.downstream.forward(id, chain)?;
                return Ok(());
            }
        };

        ctx.enter(FilterPhase::Finalizing);
        let original_size = body.len();
        let mut req = ctx.morph_request(body);

        let padding = if Morph::new(&mut self.engine).make_object(&mut req) {
            let padding = req.size();
            chain.clear_end_of_body();
            chain.push(Fragment::final_chunk(req.content, ChunkOrigin::Engine));
            padding
        } else {
            ctx.logger
                .warn_builder("could not pad object, serving it unpadded")
                .field("query", ctx.head.query.as_str())
                .emit();
            0
        };

        ctx.emitter.emit_chain(&mut self.downstream, chain)?;
        ctx.enter(FilterPhase::Done);
        ctx.logger
            .debug_builder("object padded")
            .field_u64("original_size", original_size as u64)
            .field_u64("padding", padding as u64)
            .emit();
        Ok(())
    }
}
