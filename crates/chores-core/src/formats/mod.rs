//! # Formats
//!
//! Serialized forms of engine state. Pure transformations only; file I/O
//! belongs to the host.

pub mod snapshot;

pub use snapshot::{
    ChoreSnapshot, CompletionRecord, DetectorSnapshot, MAX_STATE_FILE_SIZE, STORE_VERSION,
    StageSnapshot, StoreSnapshot,
};
