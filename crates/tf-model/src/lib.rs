//! Core data model shared by every crate in the track-finder: hits, station
//! geometry, the Kalman state vector, triplets, growing branches, and
//! finalized tracks.
//!
//! This crate has no dependency on any other `tf-*` crate; everything else
//! in the workspace builds on top of it.

mod branch;
mod hit;
mod kalman;
mod station;
mod track;
mod triplet;

pub mod ids;
pub mod physics;

pub use branch::Branch;
pub use hit::{Hit, HitId, HitKey};
pub use kalman::{KalmanState, STATE_DIM};
pub use station::{
    field_approx_coefficient_count, FieldPolynomial, FieldSlice, Station, StationError,
    MAX_FIELD_APPROX_ORDER,
};
pub use track::Track;
pub use triplet::{Triplet, TripletMomentum};
