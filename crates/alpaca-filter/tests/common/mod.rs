#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use alpaca_cache::ResponseCache;
use alpaca_core::{FilterConfig, RequestId, RequestRole, ResponseHead, ScopeConfig};
use alpaca_data::{ChildRequest, QueuedFetcher};
use alpaca_filter::{FilterController, Participation};
use alpaca_morph::{padding_target, EngineBuffer, MorphEngine, MorphRequest};
use alpaca_streaming::{BodyChain, CollectingDownstream, Fragment};
use http::StatusCode;

pub type Controller = FilterController<FakeEngine, QueuedFetcher, CollectingDownstream>;

/// Engine with canned behaviour.
///
/// Pages list their references as `css:<uri>` and `obj:<uri>` lines. Rendering
/// appends a marker listing cached URIs and bodies in sorted order. Content
/// starting with the gzip magic or holding an `!unrenderable` line cannot be
/// rendered.
#[derive(Debug, Default)]
pub struct FakeEngine {
    pub allocated: usize,
    pub released: usize,
    pub rendered: usize,
}

impl FakeEngine {
    fn output(&mut self, data: Vec<u8>) -> Option<EngineBuffer> {
        self.allocated += 1;
        Some(EngineBuffer::new(data))
    }

    pub fn outstanding(&self) -> usize {
        self.allocated - self.released
    }
}

fn lines_with(content: &[u8], prefix: &str) -> Vec<String> {
    String::from_utf8_lossy(content)
        .lines()
        .filter_map(|l| l.strip_prefix(prefix))
        .map(str::to_string)
        .collect()
}

fn sorted_entries(cache: &ResponseCache) -> Vec<(String, Vec<u8>)> {
    let mut entries: Vec<(String, Vec<u8>)> = cache
        .iter()
        .map(|(uri, data)| (uri.to_string(), data.to_vec()))
        .collect();
    entries.sort();
    entries
}

impl MorphEngine for FakeEngine {
    fn css_references(&mut self, req: &MorphRequest) -> Vec<String> {
        lines_with(&req.content, "css:")
    }

    fn embeddable_references(&mut self, req: &MorphRequest) -> Vec<String> {
        lines_with(&req.content, "obj:")
    }

    fn inline_css(&mut self, req: &MorphRequest, cache: &ResponseCache) -> Option<EngineBuffer> {
        let mut out = String::new();
        for line in String::from_utf8_lossy(&req.content).lines() {
            if !line.starts_with("css:") {
                out.push_str(line);
                out.push('\n');
            }
        }
        for (_, body) in sorted_entries(cache) {
            out.push_str(&String::from_utf8_lossy(&body));
            out.push('\n');
        }
        self.output(out.into_bytes())
    }

    fn render_document(&mut self, req: &MorphRequest, cache: &ResponseCache) -> Option<EngineBuffer> {
        let compressed = req.content.starts_with(&[0x1f, 0x8b]);
        if compressed || !lines_with(&req.content, "!unrenderable").is_empty() {
            return None;
        }
        self.rendered += 1;

        let mut out = req.content.clone();
        let listed: Vec<String> = sorted_entries(cache)
            .into_iter()
            .map(|(uri, body)| format!("{uri}={}", String::from_utf8_lossy(&body)))
            .collect();
        out.extend_from_slice(format!("<!-- padded: {} -->", listed.join(",")).as_bytes());
        self.output(out)
    }

    fn make_object(&mut self, req: &MorphRequest) -> Option<EngineBuffer> {
        let target = padding_target(&req.query)?;
        if target < req.size() {
            return None;
        }
        self.output(vec![b'#'; target - req.size()])
    }

    fn release(&mut self, _buffer: EngineBuffer) {
        self.released += 1;
    }
}

pub fn controller() -> Controller {
    FilterController::new(
        FakeEngine::default(),
        QueuedFetcher::new(1000),
        CollectingDownstream::new(),
    )
}

pub fn deterministic(css_inlining: bool) -> Arc<FilterConfig> {
    let scope = ScopeConfig {
        deterministic: Some(true),
        obj_num: Some(2),
        obj_size: Some(100),
        max_obj_size: Some(1000),
        css_inlining_enabled: Some(css_inlining),
        ..Default::default()
    };
    Arc::new(scope.resolve().expect("valid config"))
}

pub fn disabled() -> Arc<FilterConfig> {
    Arc::new(FilterConfig::disabled())
}

pub fn html_head(uri: &str, body: &[u8]) -> ResponseHead {
    ResponseHead::new(uri)
        .with_host("example.org")
        .with_content_type("text/html; charset=utf-8")
        .with_content_length(body.len() as u64)
}

/// Split `body` into `parts` roughly equal fragments, the last one ending the body.
pub fn split(body: &[u8], parts: usize) -> Vec<BodyChain> {
    let parts = parts.max(1);
    let step = body.len().div_ceil(parts).max(1);
    let mut chains: Vec<BodyChain> = body
        .chunks(step)
        .map(|c| BodyChain::single(Fragment::data(c.to_vec())))
        .collect();
    if chains.is_empty() {
        chains.push(BodyChain::single(Fragment::data(Vec::new())));
    }
    if let Some(last) = chains.last_mut() {
        last.fragments_mut()[0].end_of_body = true;
    }
    chains
}

/// Deliver a whole top-level page.
pub fn send_page(
    ctl: &mut Controller,
    id: RequestId,
    uri: &str,
    body: &[u8],
    config: Arc<FilterConfig>,
) -> Participation {
    let mut head = html_head(uri, body);
    let participation = ctl.on_header(id, RequestRole::TopLevel, &mut head, config.clone());
    for chain in split(body, 3) {
        ctl.on_body(id, chain).expect("downstream accepts");
    }
    participation
}

/// Child responses keyed by URI; unknown URIs answer 404.
pub type Site = HashMap<String, (StatusCode, Vec<u8>)>;

pub fn site(entries: &[(&str, &str)]) -> Site {
    entries
        .iter()
        .map(|(uri, body)| (uri.to_string(), (StatusCode::OK, body.as_bytes().to_vec())))
        .collect()
}

/// Answer one child fetch with its header and a fragmented body.
pub fn serve_child(ctl: &mut Controller, child: &ChildRequest, site: &Site, config: Arc<FilterConfig>) {
    let (status, body) = site
        .get(&child.uri)
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, b"not found".to_vec()));

    let mut head = ResponseHead::new(child.uri.clone())
        .with_status(status)
        .with_content_type("image/png");
    ctl.on_header(child.id, RequestRole::Subrequest, &mut head, config);
    for chain in split(&body, 2) {
        ctl.on_body(child.id, chain).expect("downstream accepts");
    }
}

/// Serve every queued child until the fetcher is idle.
pub fn serve_all(ctl: &mut Controller, site: &Site, config: Arc<FilterConfig>) -> Vec<Vec<ChildRequest>> {
    let mut rounds = Vec::new();
    loop {
        let issued = ctl.fetcher_mut().drain();
        if issued.is_empty() {
            return rounds;
        }
        for child in &issued {
            serve_child(ctl, child, site, config.clone());
        }
        rounds.push(issued);
    }
}
