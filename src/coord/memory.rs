//! In-process coordination backend.
//!
//! Implements the [`Session`] contract against a shared in-memory
//! namespace with real session semantics: `create` is linearizable per
//! path, ephemeral nodes record their owning session, and closing (or
//! dropping) a session expires everything it owned. Backs the test
//! suite and single-process deployments; networked deployments plug
//! their own [`Connector`] in at the same seam.

use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use crate::coord::{Connector, CreateMode, Session, SessionError, Timeouts};

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    ephemeral_owner: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    next_session: u64,
    next_sequence: u64,
}

/// A shared in-memory namespace; cloning yields a handle to the same
/// cluster.
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<State>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently in the namespace.
    pub fn node_count(&self) -> usize {
        self.state.lock().map(|s| s.nodes.len()).unwrap_or(0)
    }

    /// Payload stored at `path`, if the node exists.
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state.nodes.get(path).map(|node| node.data.clone())
    }
}

impl Connector for MemoryCluster {
    fn connect(
        &self,
        _servers: &[String],
        _timeouts: Timeouts,
    ) -> Result<Arc<dyn Session>, SessionError> {
        let mut state = lock(&self.state)?;
        state.next_session += 1;
        Ok(Arc::new(MemorySession {
            id: state.next_session,
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One session against a [`MemoryCluster`].
pub struct MemorySession {
    id: u64,
    state: Arc<Mutex<State>>,
    closed: AtomicBool,
}

impl MemorySession {
    fn check_open(&self) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::Connection("session is closed".to_string()));
        }
        Ok(())
    }
}

fn lock(state: &Mutex<State>) -> Result<std::sync::MutexGuard<'_, State>, SessionError> {
    state
        .lock()
        .map_err(|_| SessionError::Connection("namespace state poisoned".to_string()))
}

fn parent_of(path: &str) -> Option<&str> {
    let idx = path.rfind('/')?;
    if idx == 0 {
        None // direct child of the root, which always exists
    } else {
        Some(&path[..idx])
    }
}

impl Session for MemorySession {
    fn exists(&self, path: &str) -> Result<bool, SessionError> {
        self.check_open()?;
        let state = lock(&self.state)?;
        Ok(state.nodes.contains_key(path))
    }

    fn create(&self, path: &str, data: &[u8], mode: CreateMode) -> Result<String, SessionError> {
        self.check_open()?;
        let mut state = lock(&self.state)?;

        if let Some(parent) = parent_of(path) {
            if !state.nodes.contains_key(parent) {
                return Err(SessionError::NoNode(parent.to_string()));
            }
        }

        let created = if mode.is_sequential() {
            state.next_sequence += 1;
            format!("{path}{:010}", state.next_sequence)
        } else {
            path.to_string()
        };

        if state.nodes.contains_key(&created) {
            return Err(SessionError::NodeExists(created));
        }
        state.nodes.insert(
            created.clone(),
            Node {
                data: data.to_vec(),
                ephemeral_owner: mode.is_ephemeral().then_some(self.id),
            },
        );
        Ok(created)
    }

    fn delete(&self, path: &str) -> Result<(), SessionError> {
        self.check_open()?;
        let mut state = lock(&self.state)?;
        state
            .nodes
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SessionError::NoNode(path.to_string()))
    }

    fn children(&self, path: &str) -> Result<Vec<String>, SessionError> {
        self.check_open()?;
        let state = lock(&self.state)?;
        if path != "/" && !state.nodes.contains_key(path) {
            return Err(SessionError::NoNode(path.to_string()));
        }
        let prefix = if path == "/" {
            "/".to_string()
        } else {
            format!("{path}/")
        };
        Ok(state
            .nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state
                .nodes
                .retain(|_, node| node.ephemeral_owner != Some(self.id));
        }
    }
}

/// An abrupt drop behaves like a process crash: the service expires the
/// session's ephemeral nodes.
impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(cluster: &MemoryCluster) -> Arc<dyn Session> {
        cluster
            .connect(&["local".to_string()], Timeouts::default())
            .unwrap()
    }

    #[test]
    fn create_requires_parent() {
        let cluster = MemoryCluster::new();
        let session = connect(&cluster);
        let err = session
            .create("/missing/child", &[], CreateMode::Persistent)
            .unwrap_err();
        assert!(matches!(err, SessionError::NoNode(parent) if parent == "/missing"));
    }

    #[test]
    fn create_is_first_writer_wins() {
        let cluster = MemoryCluster::new();
        let a = connect(&cluster);
        let b = connect(&cluster);
        a.create("/node", b"a", CreateMode::Persistent).unwrap();
        let err = b.create("/node", b"b", CreateMode::Persistent).unwrap_err();
        assert!(matches!(err, SessionError::NodeExists(_)));
    }

    #[test]
    fn ephemeral_nodes_expire_with_their_session() {
        let cluster = MemoryCluster::new();
        let owner = connect(&cluster);
        owner.create("/dir", &[], CreateMode::Persistent).unwrap();
        owner
            .create("/dir/lease", &[], CreateMode::Ephemeral)
            .unwrap();

        let observer = connect(&cluster);
        assert!(observer.exists("/dir/lease").unwrap());

        drop(owner); // crash semantics
        assert!(!observer.exists("/dir/lease").unwrap());
        assert!(observer.exists("/dir").unwrap(), "persistent node survives");
    }

    #[test]
    fn sequential_create_appends_monotonic_suffix() {
        let cluster = MemoryCluster::new();
        let session = connect(&cluster);
        session.create("/queue", &[], CreateMode::Persistent).unwrap();
        let first = session
            .create("/queue/item-", &[], CreateMode::PersistentSequential)
            .unwrap();
        let second = session
            .create("/queue/item-", &[], CreateMode::PersistentSequential)
            .unwrap();
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn children_lists_direct_descendants_only() {
        let cluster = MemoryCluster::new();
        let session = connect(&cluster);
        session.create("/dir", &[], CreateMode::Persistent).unwrap();
        session.create("/dir/a", &[], CreateMode::Persistent).unwrap();
        session.create("/dir/b", &[], CreateMode::Persistent).unwrap();
        session
            .create("/dir/a/nested", &[], CreateMode::Persistent)
            .unwrap();

        let mut kids = session.children("/dir").unwrap();
        kids.sort();
        assert_eq!(kids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn closed_session_refuses_operations() {
        let cluster = MemoryCluster::new();
        let session = connect(&cluster);
        session.close();
        assert!(matches!(
            session.exists("/anything"),
            Err(SessionError::Connection(_))
        ));
    }
}
