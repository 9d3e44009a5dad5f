//! Disposable unsubscribe token.

use tokio_util::sync::CancellationToken;

/// Handle for one registration (a channel subscription, a request binding,
/// or a composite of both).
///
/// Disposal removes exactly that pairing: it is safe mid-publish, and a
/// message already enqueued for the subscriber but not yet run is suppressed
/// rather than delivered.
///
/// Dropping the handle does **not** unsubscribe (registrations usually
/// outlive the scope that created them); call [`Subscription::dispose`], or
/// dispose the subscriber fiber — every subscription token is a child of its
/// fiber's token.
#[must_use = "hold the Subscription and call dispose() to unsubscribe"]
#[derive(Clone, Debug)]
pub struct Subscription {
    tokens: Vec<CancellationToken>,
}

impl Subscription {
    pub(crate) fn from_token(token: CancellationToken) -> Self {
        Self { tokens: vec![token] }
    }

    /// Merges several registrations into one handle disposing all of them.
    pub(crate) fn join(parts: impl IntoIterator<Item = Subscription>) -> Self {
        Self {
            tokens: parts.into_iter().flat_map(|s| s.tokens).collect(),
        }
    }

    /// Removes the registration(s). Idempotent, safe from any thread.
    pub fn dispose(&self) {
        for token in &self.tokens {
            token.cancel();
        }
    }

    /// True once every underlying registration is gone (via [`dispose`]
    /// (Self::dispose) or the owning fiber's disposal).
    pub fn is_disposed(&self) -> bool {
        self.tokens.iter().all(|t| t.is_cancelled())
    }
}
