//! Per-window scratch state (§3 `WindowState`, grounded on `CaWindowData`).
//!
//! Allocated once per worker thread and reset at the start of every window;
//! `hit_key_used` is the one exception — it is time-slice-wide and
//! monotonically grows across all windows processed by this thread (§3).

use tf_grid::Grid;
use tf_model::{Hit, HitId, Track};

/// Scratch state for one worker thread's window pipeline.
///
/// Two hit-numbering namespaces coexist here, exactly as in the reference
/// `CaWindowData`: every triplet, branch and grid query downstream of this
/// type works in *window-local* indices (`0..hits.len()`, the position in
/// `hits`/grids' entries). `ts_hit_index[local]` is the separate
/// time-slice-global id that `Hit::id` gets overwritten with on read
/// (`ReadWindowData`) and that only resurfaces when a finished track's hits
/// are reported via [`WindowState::push_reco_track`].
pub struct WindowState {
    grids: Vec<Grid>,
    hits: Vec<Hit>,
    hit_suppressed: Vec<bool>,
    hit_key_used: Vec<bool>,
    hit_start_index_on_station: Vec<u32>,
    n_hits_on_station: Vec<u32>,
    ts_hit_index: Vec<u32>,
    reco_tracks: Vec<Track>,
    reco_hit_indices: Vec<HitId>,
}

impl WindowState {
    /// Allocates scratch for a setup with `n_stations` active stations and
    /// `n_hit_keys` total keys. `hit_key_used` starts all-clear and is never
    /// reset by [`WindowState::reset_for_window`] — only the thread that
    /// owns this `WindowState` ever mutates it, so the monotone guarantee in
    /// §5 holds by construction.
    pub fn new(n_stations: usize, n_hit_keys: u32) -> Self {
        Self {
            grids: (0..n_stations).map(|_| Grid::default()).collect(),
            hits: Vec::new(),
            hit_suppressed: Vec::new(),
            hit_key_used: vec![false; n_hit_keys as usize],
            hit_start_index_on_station: vec![0; n_stations + 1],
            n_hits_on_station: vec![0; n_stations + 1],
            ts_hit_index: Vec::new(),
            reco_tracks: Vec::new(),
            reco_hit_indices: Vec::new(),
        }
    }

    /// `ReadWindowData` (§4.4 step 1): installs the window's local hit
    /// array (already sorted by station) along with the per-station
    /// partition and the window-local -> time-slice-global id mapping,
    /// resets suppression flags, and clears the previous window's
    /// reconstructed output. `ts_hit_index[i]` is `hits[i]`'s original
    /// `Hit::id` before callers repurposed `hits[i].id` for anything else;
    /// every grid and triplet built from `hits` addresses it by position
    /// (`i`), never by `hits[i].id`.
    pub fn reset_for_window(&mut self, hits: Vec<Hit>, hit_start_index_on_station: Vec<u32>, n_hits_on_station: Vec<u32>, ts_hit_index: Vec<u32>) {
        self.hit_suppressed = vec![false; hits.len()];
        self.hits = hits;
        self.hit_start_index_on_station = hit_start_index_on_station;
        self.n_hits_on_station = n_hits_on_station;
        self.ts_hit_index = ts_hit_index;
        self.reco_tracks.clear();
        self.reco_hit_indices.clear();
    }

    /// The time-slice-global id of the hit at window-local position
    /// `local_index`.
    pub fn ts_hit_index(&self, local_index: usize) -> u32 {
        self.ts_hit_index[local_index]
    }

    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn hit(&self, local_index: usize) -> &Hit {
        &self.hits[local_index]
    }

    pub fn station_hits(&self, station: usize) -> &[Hit] {
        let lo = self.hit_start_index_on_station[station] as usize;
        let hi = lo + self.n_hits_on_station[station] as usize;
        &self.hits[lo..hi]
    }

    pub fn station_hit_range(&self, station: usize) -> (usize, usize) {
        let lo = self.hit_start_index_on_station[station] as usize;
        (lo, lo + self.n_hits_on_station[station] as usize)
    }

    pub fn is_hit_suppressed(&self, local_index: usize) -> bool {
        self.hit_suppressed[local_index]
    }

    pub fn suppress_hit(&mut self, local_index: usize) {
        self.hit_suppressed[local_index] = true;
    }

    pub fn is_key_used(&self, key: u32) -> bool {
        self.hit_key_used.get(key as usize).copied().unwrap_or(false)
    }

    pub fn mark_keys_used(&mut self, front_key: u32, back_key: u32) {
        self.hit_key_used[front_key as usize] = true;
        self.hit_key_used[back_key as usize] = true;
    }

    pub fn hit_key_used(&self) -> &[bool] {
        &self.hit_key_used
    }

    pub fn grid(&self, station: usize) -> &Grid {
        &self.grids[station]
    }

    pub fn grid_mut(&mut self, station: usize) -> &mut Grid {
        &mut self.grids[station]
    }

    /// Records a finished track; `owned_hits` are window-local indices, and
    /// are translated to time-slice-global ids (as `CaWindowData` does when
    /// it pushes `hit.Id()`, not the local index, into `recoHitIndices`)
    /// before being stored.
    pub fn push_reco_track(&mut self, track: Track, owned_hits: &[HitId]) {
        self.reco_tracks.push(track);
        self.reco_hit_indices.extend(owned_hits.iter().map(|&local| self.ts_hit_index[local as usize]));
    }

    pub fn reco_tracks(&self) -> &[Track] {
        &self.reco_tracks
    }

    pub fn reco_hit_indices(&self) -> &[HitId] {
        &self.reco_hit_indices
    }
}
