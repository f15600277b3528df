//! Drives the per-window CA pipeline and slides it across a time-slice's
//! hits (§4.4 `TrackFinderWindow`, §4.8 `TrackFinder`).
//!
//! Grounded on the reference tracker's two-level driver: one `WindowState`
//! (and its monotone `hitKeyUsed`) lives per worker thread for the whole
//! time-slice, while `TrackFinderWindow`'s pipeline runs once per window on
//! top of it. `rayon` stands in for the reference's worker-thread pool and
//! `crossbeam-channel` decouples per-window monitor reporting from the
//! parallel compute lanes (see DESIGN.md for the dependency swap vs. the
//! editor this workspace started from).

mod driver;
mod pipeline;

pub use driver::find_tracks;
pub use pipeline::{read_window_data, run_window};
