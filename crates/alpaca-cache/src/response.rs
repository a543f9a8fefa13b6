//! URI-keyed cache of child response bodies.

use std::collections::HashMap;

/// A captured child response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedObject {
    /// Raw bytes. Length is authoritative; the body may contain zero bytes.
    pub data: Vec<u8>,
}

impl CapturedObject {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Captured bodies of one page assembly, keyed by referenced URI.
///
/// Written by the orchestrator as children complete and read when the page
/// is rendered. Every page owns its own cache.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, CapturedObject>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the body captured for `uri`, returning any previous body.
    pub fn insert(&mut self, uri: impl Into<String>, data: Vec<u8>) -> Option<CapturedObject> {
        self.entries.insert(uri.into(), CapturedObject::new(data))
    }

    /// Captured bytes for `uri`.
    pub fn get(&self, uri: &str) -> Option<&[u8]> {
        self.entries.get(uri).map(|o| o.data.as_slice())
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.entries.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached URIs in arbitrary order.
    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Total captured bytes.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(CapturedObject::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(uri, o)| (uri.as_str(), o.data.as_slice()))
    }
}
