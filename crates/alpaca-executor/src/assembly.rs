//! Page assembly state and the child-fetch protocol.

use alpaca_cache::ResponseCache;
use alpaca_core::RequestId;
use alpaca_data::{ChildFetcher, ChildOutcome, ChildRequest, FetchError};
use alpaca_morph::{Morph, MorphEngine, MorphRequest};

use crate::render::RenderedPage;
use crate::round::{DiscoveryRound, RoundTracker};

/// Counters of one page assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyStats {
    /// Discovery rounds that issued children.
    pub rounds: u32,
    pub children_issued: usize,
    pub children_refused: usize,
    pub children_failed: usize,
    /// Bytes stored in the page cache.
    pub captured_bytes: usize,
    /// Whether stylesheet inlining failed.
    pub css_inline_failed: bool,
}

/// Children started by one call to [`PageAssembly::issue`].
#[derive(Debug, Default)]
pub struct IssueReport {
    pub issued: Vec<ChildRequest>,
    pub refused: Vec<FetchError>,
}

impl IssueReport {
    pub fn is_empty(&self) -> bool {
        self.issued.is_empty() && self.refused.is_empty()
    }
}

/// State of the current round after a child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Children of this round are still outstanding.
    Pending,
    /// Every child of this round has been counted.
    RoundComplete,
}

/// Next step once a round is complete.
#[derive(Debug)]
pub enum Advance {
    /// A general round was issued after stylesheet inlining.
    NextRound(IssueReport),
    /// Nothing left to fetch; render the page.
    Render,
}

/// Everything one HTML page needs until its final chunk is emitted.
///
/// Owned by the page's request context. Counters and cache are never shared
/// with other pages.
#[derive(Debug)]
pub struct PageAssembly {
    page: RequestId,
    request: MorphRequest,
    original: Vec<u8>,
    css_inlining: bool,
    round: Option<DiscoveryRound>,
    tracker: RoundTracker,
    cache: ResponseCache,
    stats: AssemblyStats,
}

impl PageAssembly {
    /// Start an assembly for the captured page in `request`.
    pub fn new(page: RequestId, request: MorphRequest, css_inlining: bool) -> Self {
        let original = request.content.clone();
        Self {
            page,
            request,
            original,
            css_inlining,
            round: None,
            tracker: RoundTracker::default(),
            cache: ResponseCache::new(),
            stats: AssemblyStats::default(),
        }
    }

    /// Ask the engine which objects the page references.
    ///
    /// With stylesheet inlining enabled the stylesheet list is tried first;
    /// the general list is only used when no stylesheets are referenced.
    pub fn discover<E: MorphEngine + ?Sized>(&mut self, engine: &mut E) -> Vec<String> {
        let mut morph = Morph::new(engine);

        if self.css_inlining {
            let css = morph.css_references(&self.request);
            if !css.is_empty() {
                self.round = Some(DiscoveryRound::Css);
                return css;
            }
        }

        self.round = Some(DiscoveryRound::General);
        morph.embeddable_references(&self.request)
    }

    /// Start one child fetch per URI, in list order.
    ///
    /// Refused fetches are counted as completed immediately.
    pub fn issue<F: ChildFetcher + ?Sized>(
        &mut self,
        fetcher: &mut F,
        uris: Vec<String>,
    ) -> IssueReport {
        self.tracker = RoundTracker::start(uris.len());
        self.stats.rounds += 1;

        let mut report = IssueReport::default();
        for uri in uris {
            match fetcher.issue(self.page, &uri) {
                Ok(id) => {
                    self.tracker.track(id, uri.clone());
                    self.stats.children_issued += 1;
                    report.issued.push(ChildRequest {
                        id,
                        parent: self.page,
                        uri,
                    });
                }
                Err(e) => {
                    self.tracker.count_refused();
                    self.stats.children_refused += 1;
                    report.refused.push(e);
                }
            }
        }
        report
    }

    /// Record a finished child. Returns `None` for children this page did not issue.
    pub fn complete_child(&mut self, child: RequestId, outcome: ChildOutcome) -> Option<Progress> {
        let uri = self.tracker.finish(child)?;

        match outcome {
            ChildOutcome::Captured(body) => {
                self.stats.captured_bytes += body.len();
                self.cache.insert(uri, body);
            }
            ChildOutcome::Failed(_) => self.stats.children_failed += 1,
        }

        if self.tracker.is_complete() {
            Some(Progress::RoundComplete)
        } else {
            Some(Progress::Pending)
        }
    }

    /// Move past a completed round.
    ///
    /// After a stylesheet round the cached stylesheets are inlined and the
    /// general list of the inlined page is issued. A general round always
    /// leads to rendering, so there is never a third round.
    pub fn advance<E, F>(&mut self, engine: &mut E, fetcher: &mut F) -> Advance
    where
        E: MorphEngine + ?Sized,
        F: ChildFetcher + ?Sized,
    {
        if self.round != Some(DiscoveryRound::Css) {
            return Advance::Render;
        }

        let mut morph = Morph::new(engine);
        if !morph.inline_css(&mut self.request, &self.cache) {
            self.stats.css_inline_failed = true;
        }

        self.round = Some(DiscoveryRound::General);
        let uris = morph.embeddable_references(&self.request);
        if uris.is_empty() {
            return Advance::Render;
        }

        Advance::NextRound(self.issue(fetcher, uris))
    }

    /// Produce the final body.
    ///
    /// Falls back to the page exactly as it was captured when the engine
    /// cannot render it.
    pub fn render<E: MorphEngine + ?Sized>(&mut self, engine: &mut E) -> RenderedPage {
        if Morph::new(engine).render_document(&mut self.request, &self.cache) {
            RenderedPage::rendered(std::mem::take(&mut self.request.content))
        } else {
            RenderedPage::original(self.original.clone())
        }
    }

    /// Children issued for the current round and not yet finished.
    pub fn pending_children(&self) -> Vec<RequestId> {
        self.tracker.pending().collect()
    }

    pub fn is_round_complete(&self) -> bool {
        self.tracker.is_complete()
    }

    pub fn round(&self) -> Option<DiscoveryRound> {
        self.round
    }

    pub fn expected(&self) -> usize {
        self.tracker.expected()
    }

    pub fn completed(&self) -> usize {
        self.tracker.completed()
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn request(&self) -> &MorphRequest {
        &self.request
    }

    pub fn stats(&self) -> &AssemblyStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alpaca_core::{FilterConfig, ResponseHead};
    use alpaca_data::{classify, QueuedFetcher};
    use alpaca_morph::EngineBuffer;
    use alpaca_streaming::ChunkOrigin;
    use http::StatusCode;
    use proptest::prelude::*;

    /// Engine reading references from `css:` and `obj:` lines of the page.
    #[derive(Default)]
    struct LineEngine {
        fail_render: bool,
        released: usize,
    }

    fn lines_with<'a>(content: &'a [u8], prefix: &'a str) -> Vec<String> {
        String::from_utf8_lossy(content)
            .lines()
            .filter_map(|l| l.strip_prefix(prefix))
            .map(str::to_string)
            .collect()
    }

    impl MorphEngine for LineEngine {
        fn css_references(&mut self, req: &MorphRequest) -> Vec<String> {
            lines_with(&req.content, "css:")
        }

        fn embeddable_references(&mut self, req: &MorphRequest) -> Vec<String> {
            lines_with(&req.content, "obj:")
        }

        fn inline_css(&mut self, req: &MorphRequest, cache: &ResponseCache) -> Option<EngineBuffer> {
            let mut out: Vec<u8> = String::from_utf8_lossy(&req.content)
                .lines()
                .filter(|l| !l.starts_with("css:"))
                .flat_map(|l| format!("{l}\n").into_bytes())
                .collect();
            let mut uris: Vec<&str> = cache.uris().collect();
            uris.sort_unstable();
            for uri in uris {
                out.extend_from_slice(cache.get(uri).unwrap_or_default());
                out.push(b'\n');
            }
            Some(EngineBuffer::new(out))
        }

        fn render_document(
            &mut self,
            req: &MorphRequest,
            cache: &ResponseCache,
        ) -> Option<EngineBuffer> {
            if self.fail_render {
                return None;
            }
            let mut out = req.content.clone();
            out.extend_from_slice(format!("[{} cached]", cache.len()).as_bytes());
            Some(EngineBuffer::new(out))
        }

        fn make_object(&mut self, _req: &MorphRequest) -> Option<EngineBuffer> {
            None
        }

        fn release(&mut self, _buffer: EngineBuffer) {
            self.released += 1;
        }
    }

    fn assembly(content: &str, css_inlining: bool) -> PageAssembly {
        let head = ResponseHead::new("/index.html").with_content_type("text/html");
        let req = MorphRequest::from_head(&head, &FilterConfig::disabled(), content.as_bytes().to_vec());
        PageAssembly::new(RequestId(1), req, css_inlining)
    }

    fn run_round(page: &mut PageAssembly, fetcher: &mut QueuedFetcher) -> Option<Progress> {
        let mut last = None;
        for child in fetcher.drain() {
            let body = format!("body of {}", child.uri).into_bytes();
            last = page.complete_child(child.id, classify(&child.uri, StatusCode::OK, body));
        }
        last
    }

    #[test]
    fn test_no_references_renders_directly() {
        let mut engine = LineEngine::default();
        let mut page = assembly("<html>", true);

        assert!(page.discover(&mut engine).is_empty());
        assert_eq!(page.round(), Some(DiscoveryRound::General));

        let rendered = page.render(&mut engine);
        assert_eq!(rendered.data, b"<html>[0 cached]".to_vec());
        assert_eq!(rendered.origin, ChunkOrigin::Engine);
        assert_eq!(engine.released, 1);
    }

    #[test]
    fn test_css_disabled_uses_general_list_only() {
        let mut engine = LineEngine::default();
        let mut fetcher = QueuedFetcher::new(100);
        let mut page = assembly("css:/a.css\nobj:/x.png\nobj:/y.png", false);

        let uris = page.discover(&mut engine);
        assert_eq!(uris, vec!["/x.png".to_string(), "/y.png".to_string()]);

        page.issue(&mut fetcher, uris);
        assert_eq!(page.expected(), 2);
        assert_eq!(run_round(&mut page, &mut fetcher), Some(Progress::RoundComplete));
        assert!(matches!(page.advance(&mut engine, &mut fetcher), Advance::Render));
        assert_eq!(page.stats().rounds, 1);
    }

    #[test]
    fn test_css_round_then_general_round() {
        let mut engine = LineEngine::default();
        let mut fetcher = QueuedFetcher::new(100);
        let mut page = assembly("css:/a.css\nobj:/x.png", true);

        let uris = page.discover(&mut engine);
        assert_eq!(uris, vec!["/a.css".to_string()]);
        assert_eq!(page.round(), Some(DiscoveryRound::Css));

        page.issue(&mut fetcher, uris);
        run_round(&mut page, &mut fetcher);

        match page.advance(&mut engine, &mut fetcher) {
            Advance::NextRound(report) => {
                assert_eq!(report.issued.len(), 1);
                assert_eq!(report.issued[0].uri, "/x.png");
            }
            Advance::Render => panic!("expected a general round"),
        }
        assert_eq!(page.round(), Some(DiscoveryRound::General));
        assert_eq!(page.expected(), 1);
        assert_eq!(page.completed(), 0);

        run_round(&mut page, &mut fetcher);
        assert!(matches!(page.advance(&mut engine, &mut fetcher), Advance::Render));
        assert_eq!(page.stats().rounds, 2);
        assert_eq!(fetcher.total_issued(), 2);
    }

    #[test]
    fn test_failed_child_is_counted_but_not_cached() {
        let mut engine = LineEngine::default();
        let mut fetcher = QueuedFetcher::new(100);
        let mut page = assembly("obj:/ok.png\nobj:/gone.png", false);

        let uris = page.discover(&mut engine);
        let report = page.issue(&mut fetcher, uris);
        let (ok, gone) = (&report.issued[0], &report.issued[1]);

        assert_eq!(
            page.complete_child(gone.id, classify(&gone.uri, StatusCode::NOT_FOUND, Vec::new())),
            Some(Progress::Pending)
        );
        assert_eq!(
            page.complete_child(ok.id, classify(&ok.uri, StatusCode::OK, b"png".to_vec())),
            Some(Progress::RoundComplete)
        );

        assert!(page.cache().contains("/ok.png"));
        assert!(!page.cache().contains("/gone.png"));
        assert_eq!(page.stats().children_failed, 1);
        assert_eq!(page.stats().captured_bytes, 3);
    }

    #[test]
    fn test_refused_children_complete_the_round() {
        let mut engine = LineEngine::default();
        let mut fetcher = QueuedFetcher::new(100).refuse("/a.png");
        let mut page = assembly("obj:/a.png", false);

        let uris = page.discover(&mut engine);
        let report = page.issue(&mut fetcher, uris);

        assert_eq!(report.refused.len(), 1);
        assert!(page.is_round_complete());
        assert_eq!(page.stats().children_refused, 1);
    }

    #[test]
    fn test_unknown_child_is_not_ours() {
        let mut page = assembly("", false);
        assert!(page.pending_children().is_empty());
        assert!(page
            .complete_child(RequestId(5), ChildOutcome::Captured(Vec::new()))
            .is_none());
    }

    #[test]
    fn test_render_failure_returns_original_capture() {
        let mut engine = LineEngine {
            fail_render: true,
            ..Default::default()
        };
        let mut fetcher = QueuedFetcher::new(100);
        let mut page = assembly("css:/a.css\nobj:/x.png", true);

        let uris = page.discover(&mut engine);
        page.issue(&mut fetcher, uris);
        run_round(&mut page, &mut fetcher);
        page.advance(&mut engine, &mut fetcher);
        run_round(&mut page, &mut fetcher);

        let rendered = page.render(&mut engine);
        assert!(rendered.fell_back);
        assert_eq!(rendered.origin, ChunkOrigin::Pool);
        assert_eq!(rendered.data, b"css:/a.css\nobj:/x.png".to_vec());
    }

    proptest! {
        #[test]
        fn test_completion_order_does_not_matter(
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let content: String = (0..6).map(|i| format!("obj:/o{i}.png\n")).collect();
            let mut engine = LineEngine::default();
            let mut fetcher = QueuedFetcher::new(100);
            let mut page = assembly(&content, false);

            let uris = page.discover(&mut engine);
            let report = page.issue(&mut fetcher, uris);
            prop_assert_eq!(report.issued.len(), 6);

            let mut completions = 0;
            for (n, i) in order.iter().enumerate() {
                let child = &report.issued[*i];
                let progress = page.complete_child(
                    child.id,
                    classify(&child.uri, StatusCode::OK, child.uri.clone().into_bytes()),
                );
                if progress == Some(Progress::RoundComplete) {
                    completions += 1;
                    prop_assert_eq!(n, 5);
                }
            }
            prop_assert_eq!(completions, 1);
            prop_assert_eq!(page.cache().len(), 6);
            prop_assert_eq!(page.cache().get("/o3.png"), Some(&b"/o3.png"[..]));
        }
    }
}
