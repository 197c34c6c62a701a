//! Sentry Storage - the repository-interface persistence boundary.
//!
//! The gateway treats durability as an internal implementation detail:
//! every component that needs to persist state (credentials, paired
//! devices, sessions, cost entries, approval requests, trust signals,
//! rollout state, cache entries, batch queue items) goes through a
//! [`kv::KvStore`] rather than touching a concrete database. This crate
//! ships one implementation, [`kv::MemoryKvStore`], an in-memory store
//! keyed by namespace — sufficient for a single-process local daemon
//! and swappable later without changing any call site.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, TypedRepository};
