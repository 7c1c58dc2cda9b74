//! Branchward - idempotent branch creation against the GitHub refs API
//!
//! Given a branch name and a base branch, branchward guarantees the branch
//! exists afterwards: it creates the branch from the base if absent,
//! reconciles races with concurrent creators, and waits out the API's
//! read-after-write lag before declaring success.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to ensure)
//! - [`ensure`] - The ensure-branch-exists protocol state machine
//! - [`forge`] - Reference-store abstraction (GitHub v1, mock for tests)
//!
//! # Correctness Invariants
//!
//! 1. A call performs at most one reference creation and at most one deletion
//! 2. A second call for an existing branch performs no mutation
//! 3. Only not-found and conflict errors are interpreted; everything else
//!    propagates to the caller unchanged

pub mod cli;
pub mod ensure;
pub mod forge;
