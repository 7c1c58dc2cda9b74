//! forge::traits
//!
//! Reference-store trait definition for interacting with remote hosting
//! services.
//!
//! # Design
//!
//! The `RefStore` trait is async because ref operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully.
//!
//! The trait is the exact capability set the ensure protocol consumes: read a
//! named reference, create one pointing at a SHA, delete one. Anything beyond
//! that (branch content, merges, pull requests) is out of scope.
//!
//! # Ref name forms
//!
//! The GitHub refs API consumes two encodings of the same branch name:
//! short form `heads/<name>` for reads, fully-qualified `refs/heads/<name>`
//! for create and delete. [`short_ref`] and [`full_ref`] produce them.
//!
//! # Example
//!
//! ```ignore
//! use branchward::forge::{full_ref, short_ref, RefStore, RefStoreError};
//!
//! async fn branch_sha(store: &dyn RefStore, branch: &str) -> Result<String, RefStoreError> {
//!     let git_ref = store.get_ref(&short_ref(branch)).await?;
//!     Ok(git_ref.sha)
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from reference-store operations.
///
/// Only [`NotFound`] and [`Conflict`] are interpreted by the ensure protocol;
/// every other variant is propagated unchanged to the caller.
///
/// [`NotFound`]: RefStoreError::NotFound
/// [`Conflict`]: RefStoreError::Conflict
#[derive(Debug, Clone, Error)]
pub enum RefStoreError {
    /// The requested reference was not found (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The reference already exists or the request was rejected as
    /// unprocessable (HTTP 422).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl RefStoreError {
    /// True when the error means the reference does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RefStoreError::NotFound(_))
    }

    /// True when the error means the reference already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(self, RefStoreError::Conflict(_))
    }
}

/// A named reference and the content hash it points to.
///
/// Transient: looked up from the remote store on every call, never cached
/// across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    /// Fully-qualified name, e.g. `refs/heads/main`.
    pub name: String,
    /// The SHA the reference points to.
    pub sha: String,
}

/// Short ref form used by read calls: `heads/<branch>`.
pub fn short_ref(branch: &str) -> String {
    format!("heads/{}", branch)
}

/// Fully-qualified ref form used by create/delete calls: `refs/heads/<branch>`.
pub fn full_ref(branch: &str) -> String {
    format!("refs/heads/{}", branch)
}

/// The RefStore trait for reading and mutating named references on a remote
/// hosting service.
///
/// Implementations hold the repository coordinates (owner, repo) and
/// credentials; callers pass only the ref name in the form each call expects.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, RefStoreError>`. Callers should handle:
/// - `NotFound`: the reference doesn't exist
/// - `Conflict`: the reference already exists (create) or is contended (delete)
/// - everything else: propagate; this layer does not retry
#[async_trait]
pub trait RefStore: Send + Sync {
    /// Read a reference by short name (`heads/<branch>`).
    ///
    /// # Errors
    ///
    /// - `NotFound` if the reference doesn't exist
    async fn get_ref(&self, short_ref: &str) -> Result<GitRef, RefStoreError>;

    /// Create a reference by fully-qualified name (`refs/heads/<branch>`)
    /// pointing at `sha`.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the reference already exists
    async fn create_ref(&self, full_ref: &str, sha: &str) -> Result<GitRef, RefStoreError>;

    /// Delete a reference by fully-qualified name (`refs/heads/<branch>`).
    ///
    /// # Errors
    ///
    /// - `NotFound` or `Conflict` if the reference is already gone; callers
    ///   that only need "gone afterwards" may treat both as success
    async fn delete_ref(&self, full_ref: &str) -> Result<(), RefStoreError>;
}
