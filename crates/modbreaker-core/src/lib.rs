// modbreaker-core/src/lib.rs
//! Types shared by every ModBreaker crate: the unified [`Error`], the
//! pipeline [`Stage`] tags it carries, and small geometry values.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
