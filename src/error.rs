use thiserror::Error;

use crate::coord::SessionError;
use crate::snowflake::{MAX_DATA_CENTER_ID, MAX_WORKER_ID};

/// The error type for this crate.
///
/// Every variant carries a stable numeric code (see [`Error::code`]) so
/// operators can match on codes in log pipelines without parsing messages.
#[derive(Error, Debug)]
pub enum Error {
    /// The wall clock reads earlier than the last timestamp an ID was
    /// issued at. Callers must not retry blindly: this signals an
    /// operator-visible clock anomaly.
    #[error("clock moved backwards: last id issued at {last}ms, clock now reads {now}ms")]
    ClockMovedBackwards { last: i64, now: i64 },
    /// The per-millisecond sequence was exhausted and the clock failed to
    /// advance within the spin budget.
    #[error("clock did not advance within {waited_ms}ms while the sequence was exhausted")]
    ClockStalled { waited_ms: u64 },
    #[error("worker id {0} exceeds the maximum {max}", max = MAX_WORKER_ID)]
    WorkerIdOutOfRange(u16),
    #[error("data center id {0} exceeds the maximum {max}", max = MAX_DATA_CENTER_ID)]
    DataCenterIdOutOfRange(u8),
    #[error("worker id not set; claim one from the allocator or set it explicitly")]
    WorkerIdMissing,
    /// The wall clock no longer fits the ID's timestamp field; the
    /// generator epoch must be moved forward.
    #[error("over the time limit")]
    OverTimeLimit,
    #[error("mutex is poisoned (i.e. a panic happened while it was locked)")]
    MutexPoisoned,
    #[error("no coordination servers configured")]
    NoServers,
    #[error("could not establish a coordination session")]
    StartConnection(#[source] SessionError),
    #[error("coordination session failed")]
    Connection(#[source] SessionError),
    #[error("coordination operation failed")]
    Operation(#[source] SessionError),
    #[error("no worker id available after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl Error {
    /// Stable error code, kept compatible with the historical table
    /// (10000 = operation, 10001 = connection, 10002 = startup
    /// connection, 10003 = server list, 10004 = invalid path).
    pub fn code(&self) -> u32 {
        match self {
            Error::Operation(_) => 10000,
            Error::Connection(_) => 10001,
            Error::StartConnection(_) => 10002,
            Error::NoServers => 10003,
            Error::InvalidPath { .. } => 10004,
            Error::AllocationExhausted { .. } => 10005,
            Error::ClockMovedBackwards { .. } => 10006,
            Error::ClockStalled { .. } => 10007,
            Error::WorkerIdOutOfRange(_) => 10008,
            Error::DataCenterIdOutOfRange(_) => 10009,
            Error::WorkerIdMissing => 10010,
            Error::MutexPoisoned => 10011,
            Error::OverTimeLimit => 10012,
        }
    }
}
