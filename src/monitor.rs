//! Graceful-shutdown coordination.
//!
//! The single place the process reacts to termination: a loop over the
//! background-error channel and the OS termination signal. Background
//! errors are logged as warnings and the process continues; the signal
//! releases this node's worker-id claim (best-effort) and returns so
//! the entry point can exit cleanly.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::allocator::WorkerIdAllocator;
use crate::error::Error;

pub async fn run(
    mut errors: mpsc::Receiver<Error>,
    allocator: Arc<WorkerIdAllocator>,
    worker_id: u16,
) {
    let mut errors_open = true;
    loop {
        tokio::select! {
            maybe_err = errors.recv(), if errors_open => match maybe_err {
                Some(err) => {
                    tracing::warn!(code = err.code(), error = %err, "background error");
                }
                None => errors_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("termination signal received");
                match allocator.release(worker_id) {
                    Ok(true) => tracing::info!(worker_id, "released worker id"),
                    Ok(false) => tracing::warn!(worker_id, "claim node was already gone"),
                    Err(err) => {
                        tracing::warn!(code = err.code(), error = %err, "failed to release worker id");
                    }
                }
                return;
            }
        }
    }
}
