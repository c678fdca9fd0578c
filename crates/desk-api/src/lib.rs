//! desk-api: Support backend contract and REST client
//!
//! This crate describes the operations the support console consumes from the
//! remote backend (chat turns, conversation resolution, history and escalation
//! listings) and provides an HTTP implementation of them.

pub mod backend;
pub mod error;
mod loose;
pub mod types;

pub use backend::SupportBackend;
pub use backend::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT, HttpBackend};
pub use error::{Error, Result};
pub use types::*;
