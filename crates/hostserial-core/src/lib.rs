//! Shared value types for the USB host serial transport.
//!
//! Everything in here is plain data: the line coding applied to an attached
//! adapter, the criteria used to pick which adapter to open, and the chip
//! families the host stack knows how to drive. The hardware and transport
//! crates build on these.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
