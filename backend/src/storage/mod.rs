//! # Storage Module
//!
//! Access to the hierarchical record store the measurement data lives in.
//!
//! The store is addressed by slash-delimited key paths (`Riwayat/<id>`,
//! `measurements/<key>`) and offers nothing beyond whole-subtree reads and
//! single-path writes. There are no transactions: the last writer wins.
//!
//! ## Adapters
//!
//! - **MemoryStore**: JSON tree held in process memory
//! - **JsonFileStore**: the same tree persisted to one JSON file
//! - **FirebaseStore**: Realtime Database REST API
//!
//! All adapters implement [`RecordStore`], so the domain layer never knows
//! which one it is talking to.

pub mod firebase;
pub mod json_file;
pub mod memory;
pub mod path;
pub mod traits;
mod tree;

pub use firebase::FirebaseStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use path::{StorePath, HISTORY_ROOT, TEMPLATES_ROOT};
pub use traits::RecordStore;
