//! Reusable pool of coordination sessions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::coord::{Connector, Session, Timeouts};

/// Floor for the configured session timeout; a zero timeout would make
/// every session stillborn.
pub const MIN_SESSION_TIMEOUT: Duration = Duration::from_secs(1);

/// Hands out sessions on demand and recycles them after use.
///
/// Sessions are constructed lazily from the configured server list and
/// [`Timeouts`]. A failed construction yields `None` rather than an
/// error: the pool has no caller context to decide retry policy, so the
/// caller checks the handle before use.
pub struct SessionPool {
    connector: Arc<dyn Connector>,
    servers: Vec<String>,
    timeouts: Timeouts,
    idle: Mutex<Vec<Arc<dyn Session>>>,
}

impl SessionPool {
    pub fn new(connector: Arc<dyn Connector>, servers: Vec<String>, timeouts: Timeouts) -> Self {
        Self {
            connector,
            servers,
            timeouts: Timeouts {
                session: timeouts.session.max(MIN_SESSION_TIMEOUT),
                ..timeouts
            },
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Pop an idle session or construct a fresh one.
    pub fn acquire(&self) -> Option<Arc<dyn Session>> {
        if let Ok(mut idle) = self.idle.lock() {
            if let Some(session) = idle.pop() {
                return Some(session);
            }
        }
        match self.connector.connect(&self.servers, self.timeouts) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::error!(error = %err, "session construction failed");
                None
            }
        }
    }

    /// Return a session to the pool for reuse.
    pub fn release(&self, session: Arc<dyn Session>) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(session);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::memory::MemoryCluster;
    use crate::coord::SessionError;

    #[test]
    fn released_sessions_are_reused() {
        let pool = SessionPool::new(
            Arc::new(MemoryCluster::new()),
            vec!["local".to_string()],
            Timeouts::default(),
        );
        let first = pool.acquire().expect("session");
        let ptr = Arc::as_ptr(&first);
        pool.release(first);
        let second = pool.acquire().expect("session");
        assert_eq!(ptr, Arc::as_ptr(&second));
    }

    #[test]
    fn failed_construction_yields_none() {
        struct RefusingConnector;
        impl Connector for RefusingConnector {
            fn connect(
                &self,
                _servers: &[String],
                _timeouts: Timeouts,
            ) -> Result<Arc<dyn Session>, SessionError> {
                Err(SessionError::Connection("refused".to_string()))
            }
        }

        let pool = SessionPool::new(
            Arc::new(RefusingConnector),
            vec!["local".to_string()],
            Timeouts::default(),
        );
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn configured_timeouts_reach_the_connector() {
        struct CapturingConnector {
            inner: MemoryCluster,
            seen: Mutex<Option<Timeouts>>,
        }
        impl Connector for CapturingConnector {
            fn connect(
                &self,
                servers: &[String],
                timeouts: Timeouts,
            ) -> Result<Arc<dyn Session>, SessionError> {
                *self.seen.lock().unwrap() = Some(timeouts);
                self.inner.connect(servers, timeouts)
            }
        }

        let connector = Arc::new(CapturingConnector {
            inner: MemoryCluster::new(),
            seen: Mutex::new(None),
        });
        let pool = SessionPool::new(
            connector.clone(),
            vec!["local".to_string()],
            Timeouts {
                session: Duration::ZERO, // below the floor
                read: Duration::from_millis(7),
                write: Duration::from_millis(9),
            },
        );
        pool.acquire().expect("session");

        let seen = connector.seen.lock().unwrap().expect("connector was called");
        assert_eq!(seen.session, MIN_SESSION_TIMEOUT);
        assert_eq!(seen.read, Duration::from_millis(7));
        assert_eq!(seen.write, Duration::from_millis(9));
    }
}
