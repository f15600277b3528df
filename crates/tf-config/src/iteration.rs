//! One CA pipeline pass with its own cut set (§4.4, §6, GLOSSARY "Iteration").

use serde::Deserialize;

/// Cuts and flags for a single tracking iteration (e.g. "primary, fast" vs
/// "secondary, all", matching the reference tracker's iteration list).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Iteration {
    pub doublet_chi2_cut: f64,
    pub triplet_chi2_cut: f64,
    pub triplet_final_chi2_cut: f64,
    pub track_chi2_cut: f64,
    pub triplet_link_chi2: f64,
    pub max_station_gap: u16,
    pub min_nhits: u16,
    pub min_nhits_station0: u16,
    #[serde(default)]
    pub electron_flag: bool,
    #[serde(default)]
    pub primary_flag: bool,
    /// Scales the covariance-derived half-width of the doublet/triplet grid
    /// search window (§4.3 "Doublet step": `dx = sqrt(pick * C00) + ...`).
    #[serde(default = "defaults::pick")]
    pub pick: f64,
    /// Maximum `|dz| * |slope|` contribution folded into the same search
    /// window, and the station-extrapolation span `TrackExtender` walks in
    /// one step (§4.3, §4.5).
    #[serde(default = "defaults::max_dz")]
    pub max_dz: f64,
    /// Search-window scale used by `TrackExtender` when gathering the next
    /// hit, analogous to `pick` but tuned looser for extension (§4.5).
    #[serde(default = "defaults::pick_gather")]
    pub pick_gather: f64,
    /// Triplet slope cutoff: a doublet is rejected once `|Tx|` or `|Ty|`
    /// exceeds this after extrapolation to the right station (§4.3).
    #[serde(default = "defaults::max_slope")]
    pub max_slope: f64,
    /// Whether `SelectTracks` runs `TrackExtender` on each surviving branch
    /// before its hits are locked in (§4.4 step d "optionally call
    /// TrackExtender (iteration flag)").
    #[serde(default = "defaults::extend_tracks")]
    pub extend_tracks: bool,
}

mod defaults {
    pub fn pick() -> f64 {
        3.0
    }
    pub fn max_dz() -> f64 {
        10.0
    }
    pub fn pick_gather() -> f64 {
        3.0
    }
    pub fn max_slope() -> f64 {
        1.5
    }
    pub fn extend_tracks() -> bool {
        true
    }
}

impl Iteration {
    /// A reasonable default iteration for tests and the demo binary: loose
    /// cuts, primaries, no station gaps.
    pub fn default_primary() -> Self {
        Self {
            doublet_chi2_cut: 12.0,
            triplet_chi2_cut: 12.0,
            triplet_final_chi2_cut: 10.0,
            track_chi2_cut: 3.5,
            triplet_link_chi2: 10.0,
            max_station_gap: 0,
            min_nhits: 4,
            min_nhits_station0: 4,
            electron_flag: false,
            primary_flag: true,
            pick: defaults::pick(),
            max_dz: defaults::max_dz(),
            pick_gather: defaults::pick_gather(),
            max_slope: defaults::max_slope(),
            extend_tracks: defaults::extend_tracks(),
        }
    }
}
