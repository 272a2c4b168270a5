//! Shared error types for the services crate.

use thiserror::Error;

use cc_core::model::SelectionError;
use storage::StorageError;
use storage::remote::RemoteInitError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by the identity provider adapter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("sign-in rejected: {0}")]
    Rejected(String),
    #[error("identity provider returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("identity provider returned a malformed session: {0}")]
    MalformedSession(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the selection, completion and catalog services.
///
/// An empty selection result is not an error; callers check `is_empty()`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// No session could be resolved; the caller should send the user to sign-in.
    #[error("not signed in")]
    Unauthenticated,
    /// The store could not be reached or rejected the call. Retry by re-invoking.
    #[error(transparent)]
    Upstream(#[from] StorageError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("a completion update is already in flight")]
    Busy,
    #[error("no card to act on")]
    NoCurrentCard,
}

impl ServiceError {
    /// True for failures the user can retry by repeating the same action.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, ServiceError::Upstream(_) | ServiceError::Identity(_))
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Remote(#[from] RemoteInitError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}
