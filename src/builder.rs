use crate::error::Error;
use crate::snowflake::{
    Internals, SharedWorker, SystemClock, TimeSource, Worker, MAX_DATA_CENTER_ID, MAX_WORKER_ID,
};
use std::sync::{Arc, Mutex};

/// A builder for building the [`Worker`] generator.
///
/// The worker id is mandatory; it is the cluster-wide identity claimed
/// from the coordination namespace (or assigned statically). The data
/// center id defaults to 0.
pub struct Builder {
    worker_id: Option<u16>,
    data_center_id: u8,
    time_source: Option<Box<dyn TimeSource>>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder::new()
    }
}

impl Builder {
    /// Construct a new builder for the build of [`Worker`].
    pub fn new() -> Self {
        Self {
            worker_id: None,
            data_center_id: 0,
            time_source: None,
        }
    }

    /// Set the worker ID.
    /// If the value is out of range, `finalize` will fail.
    pub fn worker_id(mut self, worker_id: u16) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Set the data center ID.
    /// If the value is out of range, `finalize` will fail.
    pub fn data_center_id(mut self, data_center_id: u8) -> Self {
        self.data_center_id = data_center_id;
        self
    }

    /// Replace the wall clock with a custom [`TimeSource`].
    pub fn time_source(mut self, time_source: impl TimeSource) -> Self {
        self.time_source = Some(Box::new(time_source));
        self
    }

    /// Finish building and create a [`Worker`] instance.
    /// This method will return an error if validation fails.
    pub fn finalize(self) -> Result<Worker, Error> {
        let worker_id = self.worker_id.ok_or(Error::WorkerIdMissing)?;
        if worker_id > MAX_WORKER_ID {
            return Err(Error::WorkerIdOutOfRange(worker_id));
        }
        if self.data_center_id > MAX_DATA_CENTER_ID {
            return Err(Error::DataCenterIdOutOfRange(self.data_center_id));
        }

        let shared = Arc::new(SharedWorker {
            worker_id,
            data_center_id: self.data_center_id,
            clock: self.time_source.unwrap_or_else(|| Box::new(SystemClock)),
            internals: Mutex::new(Internals {
                last_timestamp: 0,
                sequence: 0,
            }),
        });
        Ok(Worker::new_inner(shared))
    }
}
