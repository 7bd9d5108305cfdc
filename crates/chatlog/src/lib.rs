//! Bounded per-room chat history with a process-wide sequence counter.
//!
//! Rooms keep their 40 most recent entries, newest first. Every entry takes
//! the next value of one shared counter, which survives restarts through
//! periodic snapshots.

pub mod error;
pub mod log;
pub mod lookup;
pub mod snapshot;

pub use {
    error::{Error, Result},
    log::{ChatLog, ChatLogEntry, ChatLogSnapshot, EntryDraft, RING_CAPACITY, RoomLog},
    lookup::{HttpProductLookup, PRODUCT_TEXT_PLACEHOLDER, ProductLookup, resolve_product_text},
    snapshot::{FileSnapshotStore, InMemorySnapshotStore, SnapshotStore},
};
