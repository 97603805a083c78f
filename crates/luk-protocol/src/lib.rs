//! # luk-protocol
//!
//! Query capsule parsing, command tokenizing, the closed action-handler
//! table, and reply assembly.

pub mod command;
pub mod handlers;
pub mod query;
pub mod reply;

pub use command::{Action, Command};
pub use handlers::{dispatch, StringTransmission};
pub use query::{Query, QueryState};
pub use reply::{QueryResult, Reply};
