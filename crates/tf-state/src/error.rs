//! Construction-time errors for [`crate::HitStore`] (§10.2): the builder is
//! the only fallible surface here; a built `HitStore` is never mutated.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HitStoreError {
    #[error("stream start indices must be strictly increasing, got {prev} then {next} at stream {stream}")]
    NonMonotoneStreamStarts { stream: usize, prev: u32, next: u32 },
    #[error("stream start index {start} at stream {stream} exceeds total hit count {n_hits}")]
    StreamStartOutOfRange { stream: usize, start: u32, n_hits: usize },
    #[error("hit {hit} front/back key out of range: front={front}, back={back}, n_hit_keys={n_hit_keys}")]
    KeyOutOfRange { hit: usize, front: u32, back: u32, n_hit_keys: u32 },
}
