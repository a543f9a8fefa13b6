//! Per-request state, addressed by request identity.

use std::collections::{HashMap, HashSet};

use alpaca_core::RequestId;

use crate::context::RequestContext;
use crate::error::RegistryError;

/// Owns every live request context of one worker.
///
/// Contexts are taken out while an event is processed and restored
/// afterwards. Child fetches do not count toward the limit, so a page that
/// was admitted can always finish its assembly. Children whose page is gone
/// are kept as orphans until their body ends.
#[derive(Debug)]
pub struct RequestRegistry {
    contexts: HashMap<RequestId, RequestContext>,
    child_pages: HashMap<RequestId, RequestId>,
    orphans: HashSet<RequestId>,
    top_level: usize,
    limit: usize,
}

impl RequestRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            child_pages: HashMap::new(),
            orphans: HashSet::new(),
            top_level: 0,
            limit,
        }
    }

    /// Whether one more top-level request can be tracked.
    pub fn has_capacity(&self) -> bool {
        self.top_level < self.limit
    }

    /// Track a new request.
    pub fn insert(&mut self, id: RequestId, ctx: RequestContext) -> Result<(), RegistryError> {
        if self.contexts.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        if !ctx.is_child() && !self.has_capacity() {
            return Err(RegistryError::Full { limit: self.limit });
        }
        self.restore(id, ctx);
        Ok(())
    }

    /// Take a context out for processing.
    pub fn take(&mut self, id: RequestId) -> Option<RequestContext> {
        let ctx = self.contexts.remove(&id)?;
        if !ctx.is_child() {
            self.top_level -= 1;
        }
        Some(ctx)
    }

    /// Put back a context taken with [`take`](Self::take).
    pub fn restore(&mut self, id: RequestId, ctx: RequestContext) {
        if !ctx.is_child() {
            self.top_level += 1;
        }
        self.contexts.insert(id, ctx);
    }

    pub fn get(&self, id: RequestId) -> Option<&RequestContext> {
        self.contexts.get(&id)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.contexts.contains_key(&id)
    }

    /// Remember that `child` was issued by `page`.
    pub fn link_child(&mut self, child: RequestId, page: RequestId) {
        self.child_pages.insert(child, page);
    }

    /// Page that issued `child`.
    pub fn page_of(&self, child: RequestId) -> Option<RequestId> {
        self.child_pages.get(&child).copied()
    }

    /// Forget the link of a finished child, returning its page.
    pub fn unlink_child(&mut self, child: RequestId) -> Option<RequestId> {
        self.child_pages.remove(&child)
    }

    /// Detach `child` from its page and drop its context.
    pub fn orphan_child(&mut self, child: RequestId) {
        self.child_pages.remove(&child);
        self.take(child);
        self.orphans.insert(child);
    }

    /// Whether `child` belongs to no page any more.
    pub fn is_orphan(&self, child: RequestId) -> bool {
        self.orphans.contains(&child)
    }

    /// Stop tracking an orphan. Returns whether it was one.
    pub fn forget_orphan(&mut self, child: RequestId) -> bool {
        self.orphans.remove(&child)
    }

    /// Number of tracked contexts, children included.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.child_pages.is_empty() && self.orphans.is_empty()
    }

    /// Number of tracked top-level requests.
    pub fn top_level(&self) -> usize {
        self.top_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use alpaca_core::{FilterConfig, ResponseHead};

    use crate::context::RequestKind;

    fn ctx(id: u64, kind: RequestKind) -> RequestContext {
        RequestContext::new(
            RequestId(id),
            kind,
            ResponseHead::new("/"),
            Arc::new(FilterConfig::disabled()),
            0,
            usize::MAX,
        )
        .unwrap()
    }

    #[test]
    fn test_limit_applies_to_top_level_only() {
        let mut registry = RequestRegistry::new(1);
        registry.insert(RequestId(1), ctx(1, RequestKind::Page)).unwrap();

        assert!(matches!(
            registry.insert(RequestId(2), ctx(2, RequestKind::Leaf)),
            Err(RegistryError::Full { limit: 1 })
        ));

        let child = ctx(3, RequestKind::Child { page: RequestId(1) });
        registry.insert(RequestId(3), child).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.top_level(), 1);
    }

    #[test]
    fn test_take_and_restore() {
        let mut registry = RequestRegistry::new(1);
        registry.insert(RequestId(1), ctx(1, RequestKind::Leaf)).unwrap();

        let taken = registry.take(RequestId(1)).unwrap();
        assert!(registry.has_capacity());
        assert!(!registry.contains(RequestId(1)));

        registry.restore(RequestId(1), taken);
        assert!(!registry.has_capacity());
        assert!(registry.get(RequestId(1)).is_some());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = RequestRegistry::new(4);
        registry.insert(RequestId(1), ctx(1, RequestKind::Leaf)).unwrap();
        assert!(matches!(
            registry.insert(RequestId(1), ctx(1, RequestKind::Leaf)),
            Err(RegistryError::Duplicate(_))
        ));
    }

    #[test]
    fn test_child_links() {
        let mut registry = RequestRegistry::new(4);
        registry.link_child(RequestId(10), RequestId(1));

        assert_eq!(registry.page_of(RequestId(10)), Some(RequestId(1)));
        assert_eq!(registry.unlink_child(RequestId(10)), Some(RequestId(1)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_orphaned_child_loses_context_and_link() {
        let mut registry = RequestRegistry::new(4);
        registry.link_child(RequestId(10), RequestId(1));
        let child = ctx(10, RequestKind::Child { page: RequestId(1) });
        registry.insert(RequestId(10), child).unwrap();

        registry.orphan_child(RequestId(10));
        assert!(registry.is_orphan(RequestId(10)));
        assert_eq!(registry.page_of(RequestId(10)), None);
        assert!(!registry.contains(RequestId(10)));
        assert!(!registry.is_empty());

        assert!(registry.forget_orphan(RequestId(10)));
        assert!(!registry.forget_orphan(RequestId(10)));
        assert!(registry.is_empty());
    }
}
