//! Client-side boundary to the hierarchical coordination service.
//!
//! The service itself (replication, consensus, session expiry) is an
//! external dependency; this crate consumes it through the [`Session`]
//! trait, which mirrors the namespace operations the allocator needs:
//! existence checks, node creation with ephemeral/sequential flags,
//! deletion, and child listing. [`Connector`] abstracts session
//! establishment so deployments can plug in their client of choice;
//! [`memory::MemoryCluster`] is the in-process backend used by tests
//! and single-node setups.

pub mod memory;
pub mod path;
pub mod pool;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a coordination session.
///
/// `NodeExists` and `NoNode` are ordinary protocol outcomes the
/// allocator reacts to (a lost claim race, an already-released node);
/// `Connection` and `Timeout` mean the link itself failed.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("node already exists: {0}")]
    NodeExists(String),
    #[error("no such node: {0}")]
    NoNode(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Flags applied when creating a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    Persistent,
    /// Removed by the service when the owning session ends.
    Ephemeral,
    /// The service appends a monotonic suffix to the requested path.
    PersistentSequential,
    EphemeralSequential,
}

impl CreateMode {
    pub fn is_ephemeral(self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    pub fn is_sequential(self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// One established session against the coordination service.
///
/// Implementations must provide linearizable `create` semantics: for a
/// given path, only one concurrent create can succeed. That is the sole
/// mechanism keeping two processes from claiming the same worker id.
pub trait Session: Send + Sync {
    /// Whether a node exists at `path`.
    fn exists(&self, path: &str) -> Result<bool, SessionError>;

    /// Create a node at `path` carrying `data`; returns the path
    /// actually created (sequential modes append a suffix).
    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<String, SessionError>;

    /// Delete the node at `path`.
    fn delete(&self, path: &str) -> Result<(), SessionError>;

    /// Names of the direct children of `path`.
    fn children(&self, path: &str) -> Result<Vec<String>, SessionError>;

    /// End the session; the service expires any ephemeral nodes it owns.
    fn close(&self);
}

/// Connection timing parameters for a session: how long the service
/// keeps the session (and its ephemeral nodes) alive without
/// heartbeats, and the per-operation read/write deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub session: Duration,
    pub read: Duration,
    pub write: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            session: Duration::from_secs(10),
            read: Duration::from_secs(3),
            write: Duration::from_secs(3),
        }
    }
}

/// Establishes [`Session`]s from configured server addresses.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        servers: &[String],
        timeouts: Timeouts,
    ) -> Result<Arc<dyn Session>, SessionError>;
}
