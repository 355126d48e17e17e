//! Cooperative cancellation shared by every branch of a search.
//!
//! A [`CancellationScope`] is either backed by a token, in which case any
//! clone can cancel the whole session from any thread, or absent, in which
//! case the session can never be cancelled and every check is free.

use tokio_util::sync::CancellationToken;

use crate::error::SearchError;

/// Write-once cancel signal for one search session.
///
/// Cloning is cheap; all clones observe the same signal. A scope is shared by
/// every root of a multi-root session, so cancelling stops all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationScope {
    token: Option<CancellationToken>,
}

impl CancellationScope {
    /// A fresh scope that can be cancelled.
    pub fn new() -> Self {
        Self {
            token: Some(CancellationToken::new()),
        }
    }

    /// A scope that is never cancelled.
    pub fn none() -> Self {
        Self { token: None }
    }

    /// Share an existing token, e.g. one owned by an async application.
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token: Some(token) }
    }

    /// A scope that is cancelled when `self` is, but can also be cancelled
    /// on its own without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.as_ref().map(CancellationToken::child_token),
        }
    }

    /// Whether this scope can be cancelled at all.
    pub fn is_cancellable(&self) -> bool {
        self.token.is_some()
    }

    /// Request cancellation. Idempotent.
    ///
    /// Returns [`SearchError::NotCancellable`] for a scope created with
    /// [`CancellationScope::none`].
    pub fn cancel(&self) -> Result<(), SearchError> {
        match &self.token {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(SearchError::NotCancellable),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// `Err(Cancelled)` once the scope is cancelled, for use with `?`.
    #[inline]
    pub(crate) fn check(&self) -> Result<(), SearchError> {
        if self.is_cancelled() {
            Err(SearchError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn token(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_never_cancelled() {
        let scope = CancellationScope::none();
        assert!(!scope.is_cancellable());
        assert!(matches!(scope.cancel(), Err(SearchError::NotCancellable)));
        assert!(!scope.is_cancelled());
        assert!(scope.check().is_ok());
    }

    #[test]
    fn default_is_none() {
        assert!(!CancellationScope::default().is_cancellable());
    }

    #[test]
    fn clones_share_the_signal() {
        let scope = CancellationScope::new();
        let other = scope.clone();
        assert!(scope.check().is_ok());

        other.cancel().unwrap();
        assert!(scope.is_cancelled());
        assert!(matches!(scope.check(), Err(SearchError::Cancelled)));

        // Second cancel is a no-op.
        scope.cancel().unwrap();
        assert!(scope.is_cancelled());
    }

    #[test]
    fn child_follows_parent_but_not_the_reverse() {
        let parent = CancellationScope::new();
        let child = parent.child();
        child.cancel().unwrap();
        assert!(!parent.is_cancelled());

        let child = parent.child();
        parent.cancel().unwrap();
        assert!(child.is_cancelled());
    }

    #[test]
    fn wraps_external_token() {
        let token = CancellationToken::new();
        let scope = CancellationScope::from_token(token.clone());
        token.cancel();
        assert!(scope.is_cancelled());
    }
}
