//! ensure
//!
//! Idempotent "ensure branch exists" protocol.
//!
//! # Design
//!
//! [`BranchEnsurer`] drives a small state machine against a [`RefStore`]:
//!
//! ```text
//! CheckExists -> Create (with conflict cleanup) -> Verify -> outcome
//! ```
//!
//! The protocol tolerates two remote-store realities:
//!
//! - **Concurrent creators.** Multiple independent callers may race to create
//!   the same branch. A create that fails with a conflict is reconciled by
//!   re-reading the target: readable means another actor won the race and the
//!   branch is reused; unreadable means the conflicting ref is stale and is
//!   deleted before one bounded retry. No distributed lock is needed.
//! - **Read-after-write lag.** A just-created ref may not be immediately
//!   readable, so the final phase polls with exponential backoff until the
//!   branch is confirmed readable or retries are exhausted.
//!
//! Only the two expected error kinds (not-found, conflict) are interpreted;
//! every other store error propagates unchanged.
//!
//! # Example
//!
//! ```ignore
//! use branchward::ensure::ensure_branch_exists;
//! use branchward::forge::github::GitHubRefStore;
//!
//! let store = GitHubRefStore::new(token, "octocat", "hello-world");
//! let outcome = ensure_branch_exists(&store, "topic", "main").await?;
//! if outcome.existed_already() {
//!     println!("branch was already there");
//! }
//! ```

mod sleep;

pub use sleep::{RecordingSleeper, Sleeper, TokioSleeper};

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::forge::{full_ref, short_ref, RefStore, RefStoreError};

/// Default bound on creation attempts (initial try plus cleanup retries).
pub const DEFAULT_MAX_CREATE_ATTEMPTS: u32 = 2;

/// Default bound on verification read attempts.
pub const DEFAULT_MAX_VERIFY_ATTEMPTS: u32 = 7;

/// Default base delay for verification backoff; doubles per attempt.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Errors from the ensure protocol.
///
/// Store errors other than the interpreted not-found/conflict kinds pass
/// through as [`Store`], preserving the original error for diagnostics.
///
/// [`Store`]: EnsureError::Store
#[derive(Debug, Error)]
pub enum EnsureError {
    /// Branch or base branch name was empty.
    #[error("{0} name must be non-empty")]
    EmptyName(&'static str),

    /// Creation kept conflicting even after stale-ref cleanup.
    #[error("unable to create branch '{branch}' after {attempts} creation attempts")]
    CreateExhausted {
        /// The branch that could not be created.
        branch: String,
        /// How many creation attempts were made.
        attempts: u32,
    },

    /// The branch never became readable within the verification retries.
    #[error("branch '{branch}' not accessible after multiple retries")]
    NotAccessible {
        /// The branch that never became readable.
        branch: String,
    },

    /// An uninterpreted reference-store error, propagated unchanged.
    #[error(transparent)]
    Store(#[from] RefStoreError),
}

/// How the branch came to exist.
///
/// Both variants are success; callers that only need "exists now" can ignore
/// the distinction or collapse it via [`existed_already`].
///
/// [`existed_already`]: BranchOutcome::existed_already
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchOutcome {
    /// The branch was already present; no mutation was performed by this call.
    AlreadyExisted,
    /// The branch was created from the base branch by this call.
    Created,
}

impl BranchOutcome {
    /// True when the branch existed before this call.
    pub fn existed_already(&self) -> bool {
        matches!(self, BranchOutcome::AlreadyExisted)
    }
}

impl std::fmt::Display for BranchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchOutcome::AlreadyExisted => write!(f, "already existed"),
            BranchOutcome::Created => write!(f, "created"),
        }
    }
}

/// State machine phases.
///
/// `Verify` carries the outcome captured by whichever existence/creation path
/// led to it.
#[derive(Debug)]
enum Phase {
    CheckExists,
    Create,
    Verify(BranchOutcome),
}

/// The branch ensurer: tunables plus the state machine driver.
///
/// One instance may be reused across calls; all attempt counters are scoped
/// to a single [`ensure`] invocation and nothing is cached between calls —
/// the remote store is re-queried as the only source of truth.
///
/// [`ensure`]: BranchEnsurer::ensure
#[derive(Clone)]
pub struct BranchEnsurer {
    max_create_attempts: u32,
    max_verify_attempts: u32,
    base_backoff: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for BranchEnsurer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchEnsurer")
            .field("max_create_attempts", &self.max_create_attempts)
            .field("max_verify_attempts", &self.max_verify_attempts)
            .field("base_backoff", &self.base_backoff)
            .finish()
    }
}

impl Default for BranchEnsurer {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchEnsurer {
    /// Create an ensurer with the default tunables.
    pub fn new() -> Self {
        Self {
            max_create_attempts: DEFAULT_MAX_CREATE_ATTEMPTS,
            max_verify_attempts: DEFAULT_MAX_VERIFY_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Override the creation attempt bound.
    pub fn with_max_create_attempts(mut self, attempts: u32) -> Self {
        self.max_create_attempts = attempts;
        self
    }

    /// Override the verification attempt bound.
    pub fn with_max_verify_attempts(mut self, attempts: u32) -> Self {
        self.max_verify_attempts = attempts;
        self
    }

    /// Override the base backoff delay.
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// Inject a delay provider (tests use [`RecordingSleeper`]).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Ensure `branch` exists, creating it from `base` if absent.
    ///
    /// Idempotent: a second call for the same branch returns
    /// [`BranchOutcome::AlreadyExisted`] with no additional mutation. Safe
    /// under external concurrency: racing creators are reconciled through
    /// conflict cleanup without a distributed lock.
    ///
    /// # Errors
    ///
    /// - [`EnsureError::EmptyName`] if either name is empty
    /// - [`EnsureError::CreateExhausted`] when creation keeps conflicting
    /// - [`EnsureError::NotAccessible`] when the branch never becomes readable
    /// - [`EnsureError::Store`] for any uninterpreted store error, including
    ///   an unreadable base branch
    pub async fn ensure(
        &self,
        store: &dyn RefStore,
        branch: &str,
        base: &str,
    ) -> Result<BranchOutcome, EnsureError> {
        if branch.is_empty() {
            return Err(EnsureError::EmptyName("branch"));
        }
        if base.is_empty() {
            return Err(EnsureError::EmptyName("base branch"));
        }

        let target_short = short_ref(branch);
        let target_full = full_ref(branch);

        let mut phase = Phase::CheckExists;
        loop {
            phase = match phase {
                Phase::CheckExists => match store.get_ref(&target_short).await {
                    Ok(git_ref) => {
                        info!(branch, sha = %git_ref.sha, "branch already exists");
                        return Ok(BranchOutcome::AlreadyExisted);
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(branch, "branch absent, creating from base");
                        Phase::Create
                    }
                    Err(e) => return Err(e.into()),
                },
                Phase::Create => {
                    let outcome = self
                        .create_with_cleanup(store, branch, base, &target_short, &target_full)
                        .await?;
                    Phase::Verify(outcome)
                }
                Phase::Verify(outcome) => {
                    return self.verify(store, branch, &target_short, outcome).await;
                }
            };
        }
    }

    /// Creation phase: read the base SHA, then attempt creation with stale-ref
    /// cleanup on conflict, bounded by `max_create_attempts`.
    async fn create_with_cleanup(
        &self,
        store: &dyn RefStore,
        branch: &str,
        base: &str,
        target_short: &str,
        target_full: &str,
    ) -> Result<BranchOutcome, EnsureError> {
        // Base must be readable; any failure here fails the operation fast.
        let base_ref = store.get_ref(&short_ref(base)).await?;
        debug!(base, sha = %base_ref.sha, "resolved base branch");

        for attempt in 1..=self.max_create_attempts {
            match store.create_ref(target_full, &base_ref.sha).await {
                Ok(_) => {
                    info!(branch, sha = %base_ref.sha, "branch created");
                    return Ok(BranchOutcome::Created);
                }
                Err(e) if e.is_conflict() => {
                    warn!(branch, attempt, "create conflicted, reconciling");
                    match store.get_ref(target_short).await {
                        Ok(_) => {
                            // Another actor created it between our check and
                            // our create. Reuse theirs.
                            info!(branch, "branch created concurrently, reusing");
                            return Ok(BranchOutcome::AlreadyExisted);
                        }
                        Err(e) if e.is_not_found() => {
                            // The conflicting ref exists for writes but not
                            // reads: stale. Remove it and retry.
                            warn!(branch, "conflicting ref is stale, deleting");
                            match store.delete_ref(target_full).await {
                                Ok(()) => {}
                                // 404/422 on delete assumed to mean the ref
                                // is already gone. Inherited assumption, not
                                // an API guarantee.
                                Err(e) if e.is_not_found() || e.is_conflict() => {
                                    debug!(branch, "stale ref already gone");
                                }
                                Err(e) => return Err(e.into()),
                            }
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EnsureError::CreateExhausted {
            branch: branch.to_string(),
            attempts: self.max_create_attempts,
        })
    }

    /// Verification phase: poll the target until readable, backing off
    /// `base_backoff * 2^attempt` between misses.
    async fn verify(
        &self,
        store: &dyn RefStore,
        branch: &str,
        target_short: &str,
        outcome: BranchOutcome,
    ) -> Result<BranchOutcome, EnsureError> {
        for attempt in 0..self.max_verify_attempts {
            match store.get_ref(target_short).await {
                Ok(_) => {
                    debug!(branch, attempt, "branch verified readable");
                    return Ok(outcome);
                }
                Err(e) if e.is_not_found() => {
                    if attempt + 1 < self.max_verify_attempts {
                        let wait = self.base_backoff * (1u32 << attempt);
                        warn!(branch, attempt, wait_ms = wait.as_millis() as u64,
                            "branch not yet readable, backing off");
                        self.sleeper.sleep(wait).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EnsureError::NotAccessible {
            branch: branch.to_string(),
        })
    }
}

/// Ensure `branch` exists with the default tunables.
///
/// Convenience wrapper over [`BranchEnsurer::ensure`].
pub async fn ensure_branch_exists(
    store: &dyn RefStore,
    branch: &str,
    base: &str,
) -> Result<BranchOutcome, EnsureError> {
    BranchEnsurer::new().ensure(store, branch, base).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{MockOperation, MockRefStore};
    use crate::forge::GitRef;

    fn fast_ensurer() -> (BranchEnsurer, RecordingSleeper) {
        let sleeper = RecordingSleeper::new();
        let ensurer = BranchEnsurer::new().with_sleeper(Arc::new(sleeper.clone()));
        (ensurer, sleeper)
    }

    #[tokio::test]
    async fn existing_branch_short_circuits() {
        let store = MockRefStore::new();
        store.insert_ref("heads/topic", "abc");
        let (ensurer, sleeper) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();

        assert_eq!(outcome, BranchOutcome::AlreadyExisted);
        assert!(outcome.existed_already());
        // One existence read, nothing else. No verification for the
        // already-existed fast path.
        assert_eq!(store.operations().len(), 1);
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn absent_branch_is_created_from_base() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        let (ensurer, sleeper) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();

        assert_eq!(outcome, BranchOutcome::Created);
        let ops = store.operations();
        assert!(ops.contains(&MockOperation::CreateRef {
            full_ref: "refs/heads/topic".into(),
            sha: "base-sha".into(),
        }));
        assert!(sleeper.waits().is_empty());
    }

    #[tokio::test]
    async fn empty_names_are_rejected() {
        let store = MockRefStore::new();
        let (ensurer, _) = fast_ensurer();

        let err = ensurer.ensure(&store, "", "main").await.unwrap_err();
        assert!(matches!(err, EnsureError::EmptyName("branch")));

        let err = ensurer.ensure(&store, "topic", "").await.unwrap_err();
        assert!(matches!(err, EnsureError::EmptyName("base branch")));

        // Precondition failures never touch the store.
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn non_not_found_error_on_existence_check_propagates() {
        let store = MockRefStore::new();
        store.script_get("heads/topic", Err(RefStoreError::RateLimited));
        let (ensurer, _) = fast_ensurer();

        let err = ensurer.ensure(&store, "topic", "main").await.unwrap_err();
        assert!(matches!(
            err,
            EnsureError::Store(RefStoreError::RateLimited)
        ));
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn conflict_then_readable_reuses_branch() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        // Existence check misses, create conflicts, the reconciling re-read
        // (and verification) see the branch.
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_create(
            "refs/heads/topic",
            Err(RefStoreError::Conflict("Reference already exists".into())),
        );
        store.insert_ref("heads/topic", "other-sha");
        let (ensurer, _) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();

        assert_eq!(outcome, BranchOutcome::AlreadyExisted);
        assert_eq!(store.delete_count(), 0);
        assert_eq!(store.create_count(), 1);
    }

    #[tokio::test]
    async fn conflict_with_stale_ref_deletes_and_retries() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        // First create conflicts against a ref that reads as missing.
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_create(
            "refs/heads/topic",
            Err(RefStoreError::Conflict("Reference already exists".into())),
        );
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_delete("refs/heads/topic", Ok(()));
        let (ensurer, _) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();

        assert_eq!(outcome, BranchOutcome::Created);
        assert_eq!(store.delete_count(), 1);
        assert_eq!(store.create_count(), 2);
    }

    #[tokio::test]
    async fn delete_tolerates_already_gone() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_create(
            "refs/heads/topic",
            Err(RefStoreError::Conflict("Reference already exists".into())),
        );
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_delete(
            "refs/heads/topic",
            Err(RefStoreError::Conflict("Reference does not exist".into())),
        );
        let (ensurer, _) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();
        assert_eq!(outcome, BranchOutcome::Created);
    }

    #[tokio::test]
    async fn persistent_conflict_exhausts_creation_attempts() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        for _ in 0..2 {
            store.script_create(
                "refs/heads/topic",
                Err(RefStoreError::Conflict("Reference already exists".into())),
            );
            store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
            store.script_delete("refs/heads/topic", Ok(()));
        }
        let (ensurer, _) = fast_ensurer();

        let err = ensurer.ensure(&store, "topic", "main").await.unwrap_err();
        assert!(matches!(
            err,
            EnsureError::CreateExhausted { attempts: 2, .. }
        ));
        assert!(err.to_string().contains("topic"));
    }

    #[tokio::test]
    async fn verification_backs_off_exponentially() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_create(
            "refs/heads/topic",
            Ok(GitRef {
                name: "refs/heads/topic".into(),
                sha: "base-sha".into(),
            }),
        );
        // Verification misses on attempts 0..=5, succeeds on attempt 6.
        for _ in 0..6 {
            store.script_get("heads/topic", Err(RefStoreError::NotFound("lag".into())));
        }
        store.script_get(
            "heads/topic",
            Ok(GitRef {
                name: "refs/heads/topic".into(),
                sha: "base-sha".into(),
            }),
        );
        let (ensurer, sleeper) = fast_ensurer();

        let outcome = ensurer.ensure(&store, "topic", "main").await.unwrap();

        assert_eq!(outcome, BranchOutcome::Created);
        let expected: Vec<Duration> = (0u32..6)
            .map(|k| Duration::from_millis(500 * 2u64.pow(k)))
            .collect();
        assert_eq!(sleeper.waits(), expected);
    }

    #[tokio::test]
    async fn verification_exhaustion_fails_without_trailing_wait() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        store.script_get("heads/topic", Err(RefStoreError::NotFound("topic".into())));
        store.script_create(
            "refs/heads/topic",
            Ok(GitRef {
                name: "refs/heads/topic".into(),
                sha: "base-sha".into(),
            }),
        );
        for _ in 0..7 {
            store.script_get("heads/topic", Err(RefStoreError::NotFound("lag".into())));
        }
        let (ensurer, sleeper) = fast_ensurer();

        let err = ensurer.ensure(&store, "topic", "main").await.unwrap_err();

        assert!(err
            .to_string()
            .contains("not accessible after multiple retries"));
        assert!(err.to_string().contains("topic"));
        // Seven reads, six waits: no sleep after the final miss.
        assert_eq!(sleeper.waits().len(), 6);
    }

    #[tokio::test]
    async fn unreadable_base_fails_fast_with_original_error() {
        let store = MockRefStore::new();
        store.script_get(
            "heads/main",
            Err(RefStoreError::AuthFailed("bad token".into())),
        );
        let (ensurer, _) = fast_ensurer();

        let err = ensurer.ensure(&store, "topic", "main").await.unwrap_err();
        assert!(matches!(
            err,
            EnsureError::Store(RefStoreError::AuthFailed(_))
        ));
        assert_eq!(store.create_count(), 0);
    }

    #[tokio::test]
    async fn second_call_is_idempotent() {
        let store = MockRefStore::new();
        store.insert_ref("heads/main", "base-sha");
        let (ensurer, _) = fast_ensurer();

        let first = ensurer.ensure(&store, "topic", "main").await.unwrap();
        assert_eq!(first, BranchOutcome::Created);
        let creates_after_first = store.create_count();

        let second = ensurer.ensure(&store, "topic", "main").await.unwrap();
        assert_eq!(second, BranchOutcome::AlreadyExisted);
        assert_eq!(store.create_count(), creates_after_first);
        assert_eq!(store.delete_count(), 0);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(format!("{}", BranchOutcome::AlreadyExisted), "already existed");
        assert_eq!(format!("{}", BranchOutcome::Created), "created");
    }

    #[test]
    fn default_tunables_match_protocol_constants() {
        let ensurer = BranchEnsurer::new();
        assert_eq!(ensurer.max_create_attempts, 2);
        assert_eq!(ensurer.max_verify_attempts, 7);
        assert_eq!(ensurer.base_backoff, Duration::from_millis(500));
    }
}
