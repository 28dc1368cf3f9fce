//! Error types for live subscriptions.

use thiserror::Error;

/// Result type for subscription setup.
pub type LiveResult<T> = Result<T, LiveError>;

/// Problems with a subscription request, raised before anything is fetched.
///
/// Fetch failures are not errors of this type: they are published in the
/// subscription's [`FetchState`](crate::FetchState).
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("broker URL is required")]
    MissingBrokerUrl,

    /// Neither an entity id, a list of ids nor an entity type was given.
    #[error("an entity id or an entity type is required")]
    MissingTarget,

    #[error("subscription has been disposed")]
    Disposed,
}
