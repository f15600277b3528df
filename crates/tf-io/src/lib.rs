//! Binary archive persistence for `HitStore` (§6), grounded on
//! `CaInputData`'s serialization contract: external to the core pipeline,
//! fallible, and never consulted mid-window.

mod archive;
mod error;

pub use archive::{read_hit_store, write_hit_store};
pub use error::ArchiveError;
