//! # `lru_dict`
//!
//! A bounded-capacity, least-recently-used associative container with a
//! reentrancy-safe, deferred eviction callback.
//!
//! Every mutating operation on [`LruDict`] runs as a single critical
//! section guarded by an internal lock. Foreign code that can run during
//! that section — a key's `Hash`/`Eq` implementation, a value's `Drop`, or
//! the eviction callback — never runs *while the lock is held*: evicted
//! entries are handed to a deferred purge queue and delivered to the
//! callback only after the lock has been released. A write that contends
//! with an in-progress critical section (including one re-entered from the
//! same thread, e.g. through a callback calling back into the dict) is
//! refused with [`Error::Busy`] rather than risking corruption.
//!
//! ## Quick start
//!
//! ```rust
//! use lru_dict::LruDict;
//!
//! let dict: LruDict<String, u32> = LruDict::new(2);
//! dict.assign("a".to_string(), 1).unwrap();
//! dict.assign("b".to_string(), 2).unwrap();
//! dict.assign("c".to_string(), 3).unwrap(); // evicts "a"
//!
//! assert_eq!(dict.get(&"a".to_string()).unwrap(), None);
//! assert_eq!(dict.get(&"c".to_string()).unwrap(), Some(3));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(loom, allow(dead_code))]

pub mod config;
pub mod dict;
pub mod error;
mod sync;

pub use config::LruDictConfig;
pub use dict::{CallbackAbort, EvictionCallback, LruDict, Stats};
pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_api_is_exported_at_crate_root() {
        let dict: LruDict<u32, u32> = LruDict::with_config(4, &LruDictConfig::default());
        assert_eq!(dict.len().unwrap(), 0);
        let _: Result<Option<u32>> = dict.get(&1);
        let _stats: Stats = dict.stats();
    }
}
