//! Body fragment chains.

/// Who owns the storage behind a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkOrigin {
    /// Bytes produced by the upstream stage.
    #[default]
    Upstream,
    /// Bytes copied into request-pool memory by the filter.
    Pool,
    /// Bytes copied out of a morph engine buffer. Read-only downstream.
    Engine,
}

impl ChunkOrigin {
    /// Whether downstream stages must treat the bytes as read-only.
    pub fn is_read_only(self) -> bool {
        matches!(self, ChunkOrigin::Engine)
    }
}

/// One body fragment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    /// Fragment bytes. May contain zero bytes.
    pub data: Vec<u8>,
    /// Set on the last fragment of the body.
    pub end_of_body: bool,
    /// Storage provenance.
    pub origin: ChunkOrigin,
}

impl Fragment {
    /// Upstream fragment that is not the last one.
    pub fn data(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            end_of_body: false,
            origin: ChunkOrigin::Upstream,
        }
    }

    /// Upstream fragment carrying the end-of-body flag.
    pub fn last(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            end_of_body: true,
            origin: ChunkOrigin::Upstream,
        }
    }

    /// Final fragment produced by the filter.
    pub fn final_chunk(data: Vec<u8>, origin: ChunkOrigin) -> Self {
        Self {
            data,
            end_of_body: true,
            origin,
        }
    }

    /// Fragment length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the fragment carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move the bytes out, leaving a zero-length fragment in place.
    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

/// Ordered fragments delivered by one body event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BodyChain {
    fragments: Vec<Fragment>,
}

impl BodyChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with a single fragment.
    pub fn single(fragment: Fragment) -> Self {
        Self {
            fragments: vec![fragment],
        }
    }

    /// Append a fragment.
    pub fn push(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    /// Total bytes across all fragments.
    pub fn byte_len(&self) -> usize {
        self.fragments.iter().map(Fragment::len).sum()
    }

    /// Whether any fragment carries the end-of-body flag.
    pub fn has_end_of_body(&self) -> bool {
        self.fragments.iter().any(|f| f.end_of_body)
    }

    /// Remove the end-of-body flag from every fragment.
    pub fn clear_end_of_body(&mut self) {
        for fragment in &mut self.fragments {
            fragment.end_of_body = false;
        }
    }

    /// Concatenated bytes of all fragments.
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for fragment in &self.fragments {
            out.extend_from_slice(&fragment.data);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn fragments_mut(&mut self) -> &mut [Fragment] {
        &mut self.fragments
    }
}

impl FromIterator<Fragment> for BodyChain {
    fn from_iter<I: IntoIterator<Item = Fragment>>(iter: I) -> Self {
        Self {
            fragments: iter.into_iter().collect(),
        }
    }
}

impl Extend<Fragment> for BodyChain {
    fn extend<I: IntoIterator<Item = Fragment>>(&mut self, iter: I) {
        self.fragments.extend(iter);
    }
}

impl IntoIterator for BodyChain {
    type Item = Fragment;
    type IntoIter = std::vec::IntoIter<Fragment>;

    fn into_iter(self) -> Self::IntoIter {
        self.fragments.into_iter()
    }
}
