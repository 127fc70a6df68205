//! Data model shared by the seqpod crates.
//!
//! The types mirror the JSON shape of the platform objects they describe (camelCase keys,
//! optional fields skipped when empty) so they can be exchanged with a cluster API as-is.

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;
