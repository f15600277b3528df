//! Per-thread state for the window pipeline (§3/§4.1, grounded on
//! `CaInputData`/`CaWindowData`): the immutable, time-slice-wide
//! [`HitStore`] and the per-window [`WindowState`] scratch it's read through.

mod error;
mod hit_store;
mod window_state;

pub use error::HitStoreError;
pub use hit_store::{HitStore, HitStoreBuilder};
pub use window_state::WindowState;
