//! Storage node engine for quorumkv: in-memory memtable + LRU read cache.
//!
//! Each key holds a single `{value, version}` pair. Nothing is persisted;
//! a restarted node comes back empty and is refilled by hinted handoff and
//! read repair.

pub mod cache;
pub mod engine;
pub mod memtable;

pub use engine::StorageEngine;
pub use memtable::PutOutcome;
