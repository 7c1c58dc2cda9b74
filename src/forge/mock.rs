//! forge::mock
//!
//! Mock reference store implementation for deterministic testing.
//!
//! # Design
//!
//! The mock store keeps refs in memory and records every operation for
//! verification. Tests that need to simulate eventual consistency or races
//! can script per-ref response queues; a scripted response, when present,
//! takes precedence over the in-memory state for exactly one call.
//!
//! # Example
//!
//! ```
//! use branchward::forge::mock::MockRefStore;
//! use branchward::forge::RefStore;
//!
//! # tokio_test::block_on(async {
//! let store = MockRefStore::new();
//! store.insert_ref("heads/main", "abc123");
//!
//! let main = store.get_ref("heads/main").await.unwrap();
//! assert_eq!(main.sha, "abc123");
//!
//! store.create_ref("refs/heads/topic", "abc123").await.unwrap();
//! let topic = store.get_ref("heads/topic").await.unwrap();
//! assert_eq!(topic.sha, "abc123");
//! # });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{GitRef, RefStore, RefStoreError};

/// Mock reference store for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockRefStore {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockRefStoreInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockRefStoreInner {
    /// Refs by short name (`heads/<branch>`) mapping to their SHA.
    refs: HashMap<String, String>,
    /// Scripted get responses by short ref name.
    get_scripts: HashMap<String, VecDeque<Result<GitRef, RefStoreError>>>,
    /// Scripted create responses by fully-qualified ref name.
    create_scripts: HashMap<String, VecDeque<Result<GitRef, RefStoreError>>>,
    /// Scripted delete responses by fully-qualified ref name.
    delete_scripts: HashMap<String, VecDeque<Result<(), RefStoreError>>>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRef { short_ref: String },
    CreateRef { full_ref: String, sha: String },
    DeleteRef { full_ref: String },
}

impl MockRefStore {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockRefStoreInner::default())),
        }
    }

    /// Seed a ref into the in-memory store.
    ///
    /// `short_ref` uses the read form, e.g. `heads/main`.
    pub fn insert_ref(&self, short_ref: impl Into<String>, sha: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        inner.refs.insert(short_ref.into(), sha.into());
    }

    /// Script the next `get_ref` response for a short ref name.
    ///
    /// Scripted responses are consumed in FIFO order before the in-memory
    /// state is consulted.
    pub fn script_get(
        &self,
        short_ref: impl Into<String>,
        response: Result<GitRef, RefStoreError>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .get_scripts
            .entry(short_ref.into())
            .or_default()
            .push_back(response);
    }

    /// Script the next `create_ref` response for a fully-qualified ref name.
    pub fn script_create(
        &self,
        full_ref: impl Into<String>,
        response: Result<GitRef, RefStoreError>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .create_scripts
            .entry(full_ref.into())
            .or_default()
            .push_back(response);
    }

    /// Script the next `delete_ref` response for a fully-qualified ref name.
    pub fn script_delete(&self, full_ref: impl Into<String>, response: Result<(), RefStoreError>) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .delete_scripts
            .entry(full_ref.into())
            .or_default()
            .push_back(response);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Count recorded create operations.
    pub fn create_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::CreateRef { .. }))
            .count()
    }

    /// Count recorded delete operations.
    pub fn delete_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::DeleteRef { .. }))
            .count()
    }

    /// Convert a fully-qualified ref (`refs/heads/x`) to the short form used
    /// as the in-memory key (`heads/x`).
    fn short_key(full_ref: &str) -> &str {
        full_ref.strip_prefix("refs/").unwrap_or(full_ref)
    }
}

impl Default for MockRefStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefStore for MockRefStore {
    async fn get_ref(&self, short_ref: &str) -> Result<GitRef, RefStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::GetRef {
            short_ref: short_ref.to_string(),
        });

        if let Some(script) = inner.get_scripts.get_mut(short_ref) {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }

        match inner.refs.get(short_ref) {
            Some(sha) => Ok(GitRef {
                name: format!("refs/{}", short_ref),
                sha: sha.clone(),
            }),
            None => Err(RefStoreError::NotFound(short_ref.to_string())),
        }
    }

    async fn create_ref(&self, full_ref: &str, sha: &str) -> Result<GitRef, RefStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::CreateRef {
            full_ref: full_ref.to_string(),
            sha: sha.to_string(),
        });

        if let Some(script) = inner.create_scripts.get_mut(full_ref) {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }

        let key = Self::short_key(full_ref).to_string();
        if inner.refs.contains_key(&key) {
            return Err(RefStoreError::Conflict("Reference already exists".into()));
        }
        inner.refs.insert(key, sha.to_string());
        Ok(GitRef {
            name: full_ref.to_string(),
            sha: sha.to_string(),
        })
    }

    async fn delete_ref(&self, full_ref: &str) -> Result<(), RefStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteRef {
            full_ref: full_ref.to_string(),
        });

        if let Some(script) = inner.delete_scripts.get_mut(full_ref) {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }

        let key = Self::short_key(full_ref).to_string();
        match inner.refs.remove(&key) {
            Some(_) => Ok(()),
            None => Err(RefStoreError::NotFound(full_ref.to_string())),
        }
    }
}
