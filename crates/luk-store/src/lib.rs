//! # luk-store
//!
//! Map-partitioned persistent key/value store: in-memory database core,
//! the binary `.lukd` file codec, and the byte buffer they're both built
//! on.

pub mod codec;
pub mod database;
pub mod memfile;
pub mod record;

pub use codec::{export_database, import_database};
pub use database::Database;
pub use memfile::MemFile;
pub use record::{MapEntry, Record};

pub use luk_core::wire::MAX_MAP_NAME_LEN;
