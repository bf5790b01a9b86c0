//! Cluster-wide worker-id leasing over the coordination namespace.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::coord::path;
use crate::coord::pool::SessionPool;
use crate::coord::{CreateMode, Session, SessionError};
use crate::error::Error;
use crate::snowflake::MAX_WORKER_ID;

/// Root directory for worker-id claims.
pub const WORK_ID_PATH: &str = "/IDMaker";
/// Claim nodes are created at this prefix plus the candidate id.
pub const WORK_ID_PATH_PREFIX: &str = "/IDMaker/Id-";

/// Claims a unique integer worker id in `[0, MAX_WORKER_ID]` by probing
/// the namespace with uniform random candidates, and releases the claim
/// on shutdown.
///
/// Random probing over the full id space keeps contention low under
/// many concurrently starting nodes and bounds expected attempts to a
/// small constant even as the namespace fills; there is no
/// deterministic id reuse ordering.
pub struct WorkerIdAllocator {
    pool: Arc<SessionPool>,
    max_attempts: usize,
    retry_backoff: Duration,
    // serializes claim/release from one process
    lock: Mutex<()>,
}

impl WorkerIdAllocator {
    /// Allocator with the default attempt budget of half the id space
    /// and no backoff between attempts.
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self::with_policy(pool, (MAX_WORKER_ID as usize + 1) / 2, Duration::ZERO)
    }

    /// Allocator with an explicit attempt budget and per-retry backoff.
    pub fn with_policy(pool: Arc<SessionPool>, max_attempts: usize, retry_backoff: Duration) -> Self {
        Self {
            pool,
            max_attempts,
            retry_backoff,
            lock: Mutex::new(()),
        }
    }

    /// Claim a worker id.
    ///
    /// The claim node is created ephemeral, so an abrupt process death
    /// auto-releases it when the session expires. Losing a creation race
    /// to a concurrent claimant just moves on to the next candidate; an
    /// existence-check failure is a connectivity error and aborts.
    pub fn claim(&self) -> Result<u16, Error> {
        let _guard = self.lock.lock().map_err(|_| Error::MutexPoisoned)?;
        let session = self.acquire_session()?;
        let result = self.claim_with(session.as_ref());
        self.pool.release(session);
        result
    }

    fn claim_with(&self, session: &dyn Session) -> Result<u16, Error> {
        path::create_all(session, WORK_ID_PATH)?;

        // the payload records when the claim was taken
        let claimed_at = Utc::now().timestamp().to_be_bytes();
        let mut rng = rand::thread_rng();

        for attempt in 0..self.max_attempts {
            let candidate: u16 = rng.gen_range(0..=MAX_WORKER_ID);
            let claim_path = format!("{WORK_ID_PATH_PREFIX}{candidate}");
            path::validate(&claim_path, false)?;

            match session.exists(&claim_path) {
                Err(err) => return Err(Error::Connection(err)),
                Ok(true) => {
                    tracing::debug!(attempt, path = %claim_path, "candidate taken");
                    continue;
                }
                Ok(false) => {}
            }

            match session.create(&claim_path, &claimed_at, CreateMode::Ephemeral) {
                Ok(_) => {
                    tracing::info!(attempt, path = %claim_path, worker_id = candidate, "claimed worker id");
                    return Ok(candidate);
                }
                Err(err) => {
                    // lost the race to a concurrent claimant; benign
                    tracing::debug!(attempt, path = %claim_path, error = %err, "claim attempt failed");
                    if !self.retry_backoff.is_zero() {
                        thread::sleep(self.retry_backoff);
                    }
                }
            }
        }

        Err(Error::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }

    /// Delete this node's claim explicitly, beyond the ephemeral
    /// auto-expiry. Returns `Ok(false)` when the node was already gone.
    pub fn release(&self, worker_id: u16) -> Result<bool, Error> {
        let _guard = self.lock.lock().map_err(|_| Error::MutexPoisoned)?;
        let claim_path = format!("{WORK_ID_PATH_PREFIX}{worker_id}");
        path::validate(&claim_path, false)?;

        let session = self.acquire_session()?;
        let result = match session.delete(&claim_path) {
            Ok(()) => {
                tracing::info!(path = %claim_path, "released worker id");
                Ok(true)
            }
            Err(SessionError::NoNode(_)) => Ok(false),
            Err(err) => Err(Error::Operation(err)),
        };
        self.pool.release(session);
        result
    }

    /// Best-effort sweep of every claim under `base_path`, used for bulk
    /// cleanup. Individual delete failures are logged and skipped; the
    /// count of deleted nodes is returned.
    pub fn release_all(&self, base_path: &str) -> Result<usize, Error> {
        let _guard = self.lock.lock().map_err(|_| Error::MutexPoisoned)?;
        path::validate(base_path, false)?;

        let session = self.acquire_session()?;
        let result = sweep(session.as_ref(), base_path);
        self.pool.release(session);
        result
    }

    fn acquire_session(&self) -> Result<Arc<dyn Session>, Error> {
        self.pool.acquire().ok_or_else(|| {
            Error::StartConnection(SessionError::Connection(
                "no session available from the pool".to_string(),
            ))
        })
    }
}

fn sweep(session: &dyn Session, base_path: &str) -> Result<usize, Error> {
    let children = session.children(base_path).map_err(Error::Operation)?;
    let mut deleted = 0;
    for child in children {
        let child_path = format!("{base_path}/{child}");
        match session.delete(&child_path) {
            Ok(()) => deleted += 1,
            Err(err) => {
                tracing::warn!(path = %child_path, error = %err, "skipping node that failed to delete");
            }
        }
    }
    tracing::info!(base_path, deleted, "swept claim nodes");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::memory::MemoryCluster;
    use crate::coord::{Connector, Timeouts};
    use std::collections::HashSet;

    fn pool_for(cluster: &MemoryCluster) -> Arc<SessionPool> {
        Arc::new(SessionPool::new(
            Arc::new(cluster.clone()),
            vec!["local".to_string()],
            Timeouts::default(),
        ))
    }

    #[test]
    fn claim_creates_an_ephemeral_node_under_the_prefix() {
        let cluster = MemoryCluster::new();
        let allocator = WorkerIdAllocator::new(pool_for(&cluster));

        let worker_id = allocator.claim().unwrap();
        assert!(worker_id <= MAX_WORKER_ID);

        let observer = cluster
            .connect(&["local".to_string()], Timeouts::default())
            .unwrap();
        assert!(observer
            .exists(&format!("{WORK_ID_PATH_PREFIX}{worker_id}"))
            .unwrap());

        // the payload is the big-endian unix-seconds claim time
        let payload = cluster
            .data(&format!("{WORK_ID_PATH_PREFIX}{worker_id}"))
            .unwrap();
        assert_eq!(payload.len(), 8);
    }

    #[test]
    fn concurrent_claimants_get_distinct_ids() {
        let cluster = MemoryCluster::new();
        let claimants = 64;

        let mut handles = Vec::with_capacity(claimants);
        for _ in 0..claimants {
            // each simulated process gets its own allocator and pool
            let allocator = WorkerIdAllocator::new(pool_for(&cluster));
            handles.push(thread::spawn(move || {
                let id = allocator.claim().unwrap();
                // the allocator owns the session holding the ephemeral
                // claim; it must outlive the distinctness check
                (allocator, id)
            }));
        }

        let mut ids = HashSet::new();
        let mut live_claimants = Vec::with_capacity(claimants);
        for handle in handles {
            let (allocator, id) = handle.join().expect("claimant thread panicked");
            assert!(ids.insert(id), "duplicate worker id {id}");
            live_claimants.push(allocator);
        }
        assert_eq!(ids.len(), claimants);
        drop(live_claimants);
    }

    #[test]
    fn full_namespace_exhausts_the_attempt_budget() {
        let cluster = MemoryCluster::new();
        let session = cluster
            .connect(&["local".to_string()], Timeouts::default())
            .unwrap();
        session
            .create(WORK_ID_PATH, &[], CreateMode::Persistent)
            .unwrap();
        for id in 0..=MAX_WORKER_ID {
            session
                .create(&format!("{WORK_ID_PATH_PREFIX}{id}"), &[], CreateMode::Persistent)
                .unwrap();
        }

        let allocator = WorkerIdAllocator::with_policy(pool_for(&cluster), 128, Duration::ZERO);
        match allocator.claim() {
            Err(Error::AllocationExhausted { attempts }) => assert_eq!(attempts, 128),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn release_deletes_the_claim_node() {
        let cluster = MemoryCluster::new();
        let allocator = WorkerIdAllocator::new(pool_for(&cluster));

        let worker_id = allocator.claim().unwrap();
        assert!(allocator.release(worker_id).unwrap());
        // second release finds nothing to delete
        assert!(!allocator.release(worker_id).unwrap());
    }

    #[test]
    fn release_all_sweeps_every_claim() {
        let cluster = MemoryCluster::new();
        let allocator = WorkerIdAllocator::new(pool_for(&cluster));

        let mut claimed = Vec::new();
        for _ in 0..8 {
            claimed.push(allocator.claim().unwrap());
        }
        assert_eq!(allocator.release_all(WORK_ID_PATH).unwrap(), 8);
        assert_eq!(allocator.release_all(WORK_ID_PATH).unwrap(), 0);
        for worker_id in claimed {
            assert!(!allocator.release(worker_id).unwrap());
        }
    }
}
