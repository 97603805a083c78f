//! # luk-core
//!
//! Shared error types and wire-level constants for the luk-agent crates.
//!
//! This crate has no dependency on tokio or any I/O: it is the common
//! vocabulary that `luk-rcon`, `luk-store`, `luk-protocol` and `luk-cli`
//! all build on.

pub mod error;
pub mod wire;

pub use error::{LukError, Result};
