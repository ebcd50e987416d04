//! Validation state shared by the conditional fetches of a client.

use sha2::{Digest, Sha256};

use crate::model::UserInfo;

/// Result of a conditional fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    /// The panel returned content that differs from the last seen version
    Changed(T),
    /// Nothing new since the last successful fetch
    Unchanged,
}

impl<T> FetchOutcome<T> {
    /// Check if new content was received.
    pub fn is_changed(&self) -> bool {
        matches!(self, FetchOutcome::Changed(_))
    }

    /// Take the new content, if any.
    pub fn changed(self) -> Option<T> {
        match self {
            FetchOutcome::Changed(value) => Some(value),
            FetchOutcome::Unchanged => None,
        }
    }

    /// Map the new content.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Changed(value) => FetchOutcome::Changed(f(value)),
            FetchOutcome::Unchanged => FetchOutcome::Unchanged,
        }
    }
}

/// Hex-encoded SHA-256 of a response body.
pub fn body_hash(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

/// Point-in-time copy of a client's cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub node_etag: Option<String>,
    pub user_etag: Option<String>,
    pub node_body_hash: Option<String>,
    pub cached_users: usize,
}

/// Mutable cache state of a client; always accessed under the client's lock.
#[derive(Debug, Default)]
pub(crate) struct CacheState {
    pub(crate) node_etag: Option<String>,
    pub(crate) user_etag: Option<String>,
    node_body_hash: Option<String>,
    pub(crate) users: Vec<UserInfo>,
}

impl CacheState {
    /// Decide whether a node config body is new and, if so, record it.
    ///
    /// Hash and ETag are replaced together. Returns `false` when the body hash
    /// matches the last recorded one, leaving the state untouched.
    pub(crate) fn commit_node(&mut self, hash: String, etag: Option<String>) -> bool {
        if self.node_body_hash.as_deref() == Some(hash.as_str()) {
            return false;
        }
        self.node_body_hash = Some(hash);
        self.node_etag = etag;
        true
    }

    /// Record a freshly decoded user list and its ETag.
    pub(crate) fn commit_users(&mut self, etag: Option<String>, users: Vec<UserInfo>) {
        self.user_etag = etag;
        self.users = users;
    }

    /// Forget the node config version so the next fetch counts as new.
    pub(crate) fn reset_node(&mut self) {
        self.node_etag = None;
        self.node_body_hash = None;
    }

    pub(crate) fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            node_etag: self.node_etag.clone(),
            user_etag: self.user_etag.clone(),
            node_body_hash: self.node_body_hash.clone(),
            cached_users: self.users.len(),
        }
    }
}
