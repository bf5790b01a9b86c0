//! Globally unique, roughly time-ordered 64-bit IDs across many
//! independent processes, in the style of [Twitter's Snowflake].
//!
//! Each process claims a cluster-wide unique worker id by probing a
//! shared coordination namespace, then generates IDs locally with no
//! per-ID coordination. An ID packs, most-significant first, a
//! millisecond timestamp, a 3-bit data center id, a 12-bit worker id
//! and a 13-bit per-millisecond sequence.
//!
//! ## Quickstart
//!
//! ```
//! use idmaker::Worker;
//!
//! let worker = Worker::builder()
//!     .worker_id(1)
//!     .data_center_id(1)
//!     .finalize()
//!     .unwrap();
//! let next_id = worker.next_id().unwrap();
//! println!("{}", next_id);
//! ```
//!
//! ## Concurrent use
//!
//! `Worker` is thread-safe. `clone` it before moving to another thread:
//! ```
//! use idmaker::Worker;
//! use std::thread;
//!
//! let worker = Worker::builder()
//!     .worker_id(1)
//!     .data_center_id(1)
//!     .finalize()
//!     .unwrap();
//!
//! let mut children = Vec::new();
//! for _ in 0..10 {
//!     let thread_worker = worker.clone();
//!     children.push(thread::spawn(move || {
//!         println!("{}", thread_worker.next_id().unwrap());
//!     }));
//! }
//!
//! for child in children {
//!     child.join().unwrap();
//! }
//! ```
//!
//! ## Claiming a worker id
//!
//! In a cluster, take the worker id from the [`allocator`] instead of
//! hard-coding it. The claim lives in the coordination namespace under
//! `/IDMaker/Id-<id>` as an ephemeral node, so a crashed process frees
//! its id automatically; [`monitor::run`] releases it explicitly on a
//! clean shutdown.
//!
//! [Twitter's Snowflake]: https://blog.twitter.com/2010/announcing-snowflake

pub mod allocator;
mod builder;
pub mod config;
pub mod coord;
mod error;
pub mod monitor;
mod snowflake;

pub use crate::snowflake::*;
pub use builder::*;
pub use error::*;
