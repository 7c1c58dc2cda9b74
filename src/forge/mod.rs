//! forge
//!
//! Abstraction for remote reference stores (GitHub).
//!
//! # Architecture
//!
//! The `RefStore` trait defines the capability set the ensure protocol
//! consumes: get, create, and delete of named references. The protocol layer
//! depends only on the trait; the GitHub implementation and the mock are
//! interchangeable behind it.
//!
//! # Modules
//!
//! - `traits`: Core `RefStore` trait, `GitRef`, error taxonomy, ref name helpers
//! - [`github`]: GitHub implementation using the REST git-refs API
//! - [`mock`]: Mock implementation for deterministic testing

pub mod github;
pub mod mock;
mod traits;

pub use traits::*;
