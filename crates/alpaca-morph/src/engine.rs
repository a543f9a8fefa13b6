//! Engine trait and buffer ownership glue.

use alpaca_cache::ResponseCache;

use crate::request::MorphRequest;

/// Output buffer allocated by an engine.
///
/// Ownership passes to the caller on success; the caller hands it back through
/// [`MorphEngine::release`] exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct EngineBuffer {
    data: Vec<u8>,
}

impl EngineBuffer {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take the bytes out, for engines reclaiming their storage on release.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

/// Padding and rewrite engine.
///
/// `None` from an output-producing call means failure; the request content is
/// then left as it was.
pub trait MorphEngine {
    /// Stylesheets referenced by an HTML document.
    fn css_references(&mut self, req: &MorphRequest) -> Vec<String>;

    /// Every paddable object referenced by an HTML document.
    fn embeddable_references(&mut self, req: &MorphRequest) -> Vec<String>;

    /// Document with the cached stylesheets inlined.
    fn inline_css(&mut self, req: &MorphRequest, cache: &ResponseCache) -> Option<EngineBuffer>;

    /// Final padded document.
    fn render_document(
        &mut self,
        req: &MorphRequest,
        cache: &ResponseCache,
    ) -> Option<EngineBuffer>;

    /// Padding for a leaf object, or a synthetic object of the requested size
    /// when the request carries no content.
    fn make_object(&mut self, req: &MorphRequest) -> Option<EngineBuffer>;

    /// Return a buffer produced by this engine.
    fn release(&mut self, buffer: EngineBuffer);
}

/// Releases a leased engine buffer when dropped.
struct EngineLease<'a, E: MorphEngine + ?Sized> {
    engine: &'a mut E,
    buffer: Option<EngineBuffer>,
}

impl<E: MorphEngine + ?Sized> EngineLease<'_, E> {
    fn to_vec(&self) -> Vec<u8> {
        self.buffer
            .as_ref()
            .map(|b| b.as_bytes().to_vec())
            .unwrap_or_default()
    }
}

impl<E: MorphEngine + ?Sized> Drop for EngineLease<'_, E> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.engine.release(buffer);
        }
    }
}

/// Calls into an engine and copies its output into the request.
///
/// Every engine buffer is copied out and released before the call returns, so
/// callers never hold engine memory.
pub struct Morph<'a, E: MorphEngine + ?Sized> {
    engine: &'a mut E,
}

impl<'a, E: MorphEngine + ?Sized> Morph<'a, E> {
    pub fn new(engine: &'a mut E) -> Self {
        Self { engine }
    }

    pub fn css_references(&mut self, req: &MorphRequest) -> Vec<String> {
        self.engine.css_references(req)
    }

    pub fn embeddable_references(&mut self, req: &MorphRequest) -> Vec<String> {
        self.engine.embeddable_references(req)
    }

    /// Inline cached stylesheets into `req.content`.
    pub fn inline_css(&mut self, req: &mut MorphRequest, cache: &ResponseCache) -> bool {
        let output = self.engine.inline_css(req, cache);
        self.replace_content(req, output)
    }

    /// Replace `req.content` with the final document.
    ///
    /// On failure `req` is untouched; callers keep their own copy to fall back to.
    pub fn render_document(&mut self, req: &mut MorphRequest, cache: &ResponseCache) -> bool {
        let output = self.engine.render_document(req, cache);
        self.replace_content(req, output)
    }

    /// Replace `req.content` with the engine's object bytes.
    pub fn make_object(&mut self, req: &mut MorphRequest) -> bool {
        let output = self.engine.make_object(req);
        self.replace_content(req, output)
    }

    fn replace_content(&mut self, req: &mut MorphRequest, output: Option<EngineBuffer>) -> bool {
        let Some(buffer) = output else {
            return false;
        };

        let lease = EngineLease {
            engine: &mut *self.engine,
            buffer: Some(buffer),
        };
        req.content = lease.to_vec();
        true
    }
}
