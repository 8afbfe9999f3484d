//! Replication core of the quorumkv gateway.
//!
//! Provides: key placement over a fixed node list, a health registry with a
//! background prober, hinted handoff queues and their delivery task, and a
//! coordinator that runs quorum writes and reads with read repair.

pub mod chaos;
pub mod coordinator;
pub mod health;
pub mod hint_delivery;
pub mod hint_store;
pub mod placement;
pub mod replica_client;
