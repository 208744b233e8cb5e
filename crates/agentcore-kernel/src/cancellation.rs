//! Hierarchical cancellation (§5): cancelling a parent token cancels every
//! descendant. Tokens carry a reason so timers, throttle waits and tool
//! executions can report *why* they were interrupted. There is no custom
//! coroutine-cancellation primitive here (§9) — this is a thin, reason-
//! carrying wrapper over `tokio_util::sync::CancellationToken`'s own parent/
//! child relationship.

use std::sync::{Arc, RwLock};

use tokio_util::sync::CancellationToken;

/// A cancellation token plus the reason it was (or will be) cancelled with.
#[derive(Clone)]
pub struct CancellationSource {
    token: CancellationToken,
    reason: Arc<RwLock<Option<String>>>,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self { token: CancellationToken::new(), reason: Arc::new(RwLock::new(None)) }
    }

    /// Derive a child source. Cancelling `self` cancels every child
    /// transitively; cancelling a child never affects `self` or siblings.
    pub fn child(&self) -> Self {
        Self { token: self.token.child_token(), reason: Arc::new(RwLock::new(None)) }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.read().expect("reason lock poisoned").clone()
    }

    pub fn cancel(&self, reason: impl Into<String>) {
        *self.reason.write().expect("reason lock poisoned") = Some(reason.into());
        self.token.cancel();
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_parent_cancels_descendants() {
        let parent = CancellationSource::new();
        let child = parent.child();
        let grandchild = child.child();

        parent.cancel("session shutdown");

        assert!(parent.is_cancelled());
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
        assert_eq!(parent.reason(), Some("session shutdown".to_string()));
    }

    #[test]
    fn cancelling_child_does_not_affect_parent_or_siblings() {
        let parent = CancellationSource::new();
        let child_a = parent.child();
        let child_b = parent.child();

        child_a.cancel("tool timed out");

        assert!(child_a.is_cancelled());
        assert!(!child_b.is_cancelled());
        assert!(!parent.is_cancelled());
    }
}
