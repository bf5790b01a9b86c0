use crate::builder::Builder;
use crate::error::Error;
use chrono::prelude::*;
use std::{
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

/// bit length of the worker id
pub(crate) const WORKER_ID_BITS: u64 = 12;
/// bit length of the data center id
pub(crate) const DATA_CENTER_ID_BITS: u64 = 3;
/// bit length of the per-millisecond sequence number
pub(crate) const SEQUENCE_BITS: u64 = 13;

/// largest worker id that fits the layout
pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
/// largest data center id that fits the layout
pub const MAX_DATA_CENTER_ID: u8 = (1 << DATA_CENTER_ID_BITS) - 1;
/// mask for the sequence number
pub(crate) const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

/// left shift of the worker id field
pub(crate) const WORKER_SHIFT: u64 = SEQUENCE_BITS;
/// left shift of the data center id field
pub(crate) const DATA_CENTER_SHIFT: u64 = WORKER_ID_BITS + SEQUENCE_BITS;
/// left shift of the timestamp field
pub(crate) const TIMESTAMP_SHIFT: u64 = WORKER_ID_BITS + DATA_CENTER_ID_BITS + SEQUENCE_BITS;
/// bit length of the timestamp field
pub(crate) const TIMESTAMP_BITS: u64 = 64 - TIMESTAMP_SHIFT;

/// Fixed reference timestamp subtracted from wall-clock milliseconds
/// before encoding: 2026-01-01T00:00:00Z. The timestamp field holds
/// `2^36` milliseconds (a little over two years) from this epoch;
/// `next_id` fails with [`Error::OverTimeLimit`] once that range is
/// exceeded instead of truncating.
pub(crate) const EPOCH_MILLIS: i64 = 1_767_225_600_000;

/// How long `next_id` will re-sample the clock after the sequence wraps
/// before giving up. Clocks tick forward well below this in practice;
/// exceeding it means the time source is frozen or far too coarse.
const MAX_SEQUENCE_SPIN: Duration = Duration::from_millis(50);

/// Source of wall-clock milliseconds for the generator.
///
/// The default is [`SystemClock`]; tests inject their own to exercise
/// clock anomalies.
pub trait TimeSource: Send + Sync + 'static {
    /// Current time as milliseconds since the Unix epoch.
    fn millis(&self) -> i64;
}

/// [`TimeSource`] backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Internals of Worker.
/// This struct is not exposed to the public.
#[derive(Debug)]
pub(crate) struct Internals {
    pub(crate) last_timestamp: i64,
    pub(crate) sequence: u16,
}

/// SharedWorker is shared between Worker handles.
/// This struct is not exposed to the public.
pub(crate) struct SharedWorker {
    pub(crate) worker_id: u16,
    pub(crate) data_center_id: u8,
    pub(crate) clock: Box<dyn TimeSource>,
    pub(crate) internals: Mutex<Internals>,
}

/// Worker is a distributed unique ID generator bound to a fixed
/// `(worker_id, data_center_id)` pair, typically claimed through
/// [`WorkerIdAllocator`] at startup.
///
/// It is thread-safe and can be cloned to be used in multiple threads;
/// clones share the same state. After startup it performs no external
/// I/O: [`Worker::next_id`] only reads the clock.
///
/// [`WorkerIdAllocator`]: crate::allocator::WorkerIdAllocator
pub struct Worker(pub(crate) Arc<SharedWorker>);

impl Worker {
    /// Create a new [`Builder`] to construct a Worker.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Create a new Worker with the given SharedWorker.
    pub(crate) fn new_inner(shared: Arc<SharedWorker>) -> Self {
        Self(shared)
    }

    /// The worker id encoded into every generated ID.
    pub fn worker_id(&self) -> u16 {
        self.0.worker_id
    }

    /// The data center id encoded into every generated ID.
    pub fn data_center_id(&self) -> u8 {
        self.0.data_center_id
    }

    /// Generate the next unique id.
    ///
    /// IDs from one Worker are strictly increasing in return order. A
    /// backward clock jump fails with [`Error::ClockMovedBackwards`]
    /// rather than waiting for the clock to catch up; the anomaly is the
    /// operator's to resolve.
    pub fn next_id(&self) -> Result<u64, Error> {
        let mut internals = self.0.internals.lock().map_err(|_| Error::MutexPoisoned)?;

        let mut now = self.0.clock.millis();
        if now < internals.last_timestamp {
            return Err(Error::ClockMovedBackwards {
                last: internals.last_timestamp,
                now,
            });
        }

        if now == internals.last_timestamp {
            internals.sequence = (internals.sequence + 1) & MAX_SEQUENCE;
            if internals.sequence == 0 {
                // Sequence exhausted for this millisecond: re-sample the
                // clock until it advances, within a bounded spin budget.
                let spin_started = Instant::now();
                while now <= internals.last_timestamp {
                    if spin_started.elapsed() > MAX_SEQUENCE_SPIN {
                        return Err(Error::ClockStalled {
                            waited_ms: MAX_SEQUENCE_SPIN.as_millis() as u64,
                        });
                    }
                    thread::yield_now();
                    now = self.0.clock.millis();
                }
            }
        } else {
            internals.sequence = 0;
        }

        internals.last_timestamp = now;

        let elapsed = now - EPOCH_MILLIS;
        if elapsed < 0 || elapsed >= (1_i64 << TIMESTAMP_BITS) {
            return Err(Error::OverTimeLimit);
        }

        Ok((elapsed as u64) << TIMESTAMP_SHIFT
            | (self.0.data_center_id as u64) << DATA_CENTER_SHIFT
            | (self.0.worker_id as u64) << WORKER_SHIFT
            | internals.sequence as u64)
    }
}

/// Returns a new `Worker` referencing the same state as `self`.
/// This is used for concurrent use.
impl Clone for Worker {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// DecomposedId is the parts of a generated ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposedId {
    pub id: u64,
    /// Milliseconds since the generator epoch.
    pub timestamp: u64,
    pub data_center_id: u8,
    pub worker_id: u16,
    pub sequence: u16,
}

impl DecomposedId {
    /// Returns the embedded timestamp as milliseconds since the Unix
    /// epoch.
    pub fn unix_millis(&self) -> i64 {
        self.timestamp as i64 + EPOCH_MILLIS
    }
}

const MASK_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;
const MASK_WORKER_ID: u64 = ((1 << WORKER_ID_BITS) - 1) << WORKER_SHIFT;
const MASK_DATA_CENTER_ID: u64 = ((1 << DATA_CENTER_ID_BITS) - 1) << DATA_CENTER_SHIFT;

/// Break a generated ID up into its parts.
pub fn decompose(id: u64) -> DecomposedId {
    DecomposedId {
        id,
        timestamp: id >> TIMESTAMP_SHIFT,
        data_center_id: ((id & MASK_DATA_CENTER_ID) >> DATA_CENTER_SHIFT) as u8,
        worker_id: ((id & MASK_WORKER_ID) >> WORKER_SHIFT) as u16,
        sequence: (id & MASK_SEQUENCE) as u16,
    }
}
