//! Synchronization primitives with loom support for concurrency testing.
//!
//! This module provides type aliases that switch between production sync
//! primitives and loom's mocked versions based on the `loom` feature flag,
//! so the reentrancy-detection protocol in `dict::core` can be exhaustively
//! checked under every thread interleaving loom can generate.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::sync::Mutex;
//!
//! // Works with both parking_lot and loom
//! let data = Mutex::new(42);
//! ```
//!
//! # Testing with Loom
//!
//! ```bash
//! RUSTFLAGS="--cfg loom" cargo test --release --features loom --test loom_busy
//! ```
//!
//! No `RwLock` alias is provided: every public `LruDict` operation mutates
//! recency order, even reads, so there is no reader/writer split to model.

// ============================================================================
// Mutex (Note: we use parking_lot in production; loom provides its own with
// a std-like, `Result`-returning `lock`/`try_lock` API)
// ============================================================================

#[cfg(loom)]
pub use loom::sync::{Mutex, MutexGuard};

#[cfg(not(loom))]
pub use parking_lot::{Mutex, MutexGuard};

// ============================================================================
// Atomics
// ============================================================================

#[cfg(loom)]
pub use loom::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(not(loom))]
pub use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// ============================================================================
// Thread spawning (for loom tests)
// ============================================================================

#[cfg(loom)]
pub use loom::thread;

#[cfg(not(loom))]
pub use std::thread;
