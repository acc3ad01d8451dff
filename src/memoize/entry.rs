//! Memo Entry Module
//!
//! The value the memoization layer keeps in the bounded store: a shared
//! handle to a pending-or-settled producer future, tagged with a token.

use std::fmt;

use futures::future::{BoxFuture, Shared};

/// Producer future shared between every caller of the same key.
pub type SharedResult<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

// == Token ==
/// Identity of one insertion into the store.
///
/// Tokens are unique per cache instance. Cleanup compares the token it
/// captured at insertion with the one currently stored under the key, so a
/// settling future never removes a newer entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(pub(crate) u64);

// == Memo Entry ==
#[derive(Clone)]
pub struct MemoEntry<V, E> {
    pub(crate) future: SharedResult<V, E>,
    pub(crate) token: Token,
}

impl<V, E> MemoEntry<V, E> {
    pub fn token(&self) -> Token {
        self.token
    }

    /// The successful outcome, once the producer has settled with one.
    pub fn settled_value(&self) -> Option<&V> {
        self.future.peek().and_then(|outcome| outcome.as_ref().ok())
    }
}

impl<V, E> fmt::Debug for MemoEntry<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoEntry")
            .field("token", &self.token)
            .field("settled", &self.future.peek().is_some())
            .finish()
    }
}
