//! Handle registry.
//!
//! The executing side never hands out addresses. Each created resource is
//! filed under a fresh 8-byte token; the token is what crosses the wire,
//! and the registry is the sole authority over which tokens are live.
//! Tokens are issued from a monotonic counter and never reused, so a
//! stale token from before a destroy can only miss, never alias a newer
//! resource.

use std::collections::HashMap;

use xbridge_proto::RawHandle;

pub struct HandleRegistry<T> {
    next: RawHandle,
    entries: HashMap<RawHandle, T>,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            // 0 is the wire-level failure sentinel.
            next: 1,
            entries: HashMap::new(),
        }
    }

    /// File a resource and issue its token.
    pub fn create(&mut self, value: T) -> RawHandle {
        let token = self.next;
        self.next += 1;
        self.entries.insert(token, value);
        token
    }

    pub fn resolve(&self, token: RawHandle) -> Option<&T> {
        self.entries.get(&token)
    }

    pub fn resolve_mut(&mut self, token: RawHandle) -> Option<&mut T> {
        self.entries.get_mut(&token)
    }

    /// Retire a token and surrender its resource. Returns `None` for a
    /// token that is unknown or already destroyed; destroying twice is
    /// not an error, the second call just finds nothing.
    pub fn destroy(&mut self, token: RawHandle) -> Option<T> {
        self.entries.remove(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
