//! Logging setup shared by seqpod binaries.

mod logger;
pub use logger::*;
