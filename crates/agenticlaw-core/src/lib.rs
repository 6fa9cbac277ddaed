//! Agenticlaw Core - Types, traits, and error handling

pub mod abort;
pub mod error;
pub mod types;

pub use abort::AbortToken;
pub use error::{Error, Result};
pub use types::*;
