//! `TrackFinderWindow` (§4.4): the pipeline run once per time window on top
//! of one thread's [`WindowState`].

use tf_config::Parameters;
use tf_events::WindowCounters;
use tf_grid::Grid;
use tf_model::{Hit, HitId, Track};
use tf_state::{HitStore, WindowState};

/// `ReadWindowData` (§4.4 step 1): copies every hit in `[window_start,
/// window_end)` out of the time-slice-wide `store`, partitions it by
/// station, and installs it on `window`. `ts_hit_index[local]` records the
/// hit's position in `store` so finished tracks can report time-slice-global
/// ids (`WindowState::push_reco_track`).
pub fn read_window_data(store: &HitStore, params: &Parameters, window_start: f64, window_end: f64, window: &mut WindowState) {
    let n_active = params.active_station_count();
    let mut by_station: Vec<Vec<(u32, Hit)>> = vec![Vec::new(); n_active];

    for idx in 0..store.n_hits() as u32 {
        let hit = *store.hit(idx);
        if hit.t < window_start || hit.t >= window_end {
            continue;
        }
        let station = hit.station as usize;
        if station < n_active {
            by_station[station].push((idx, hit));
        }
    }

    let mut hits = Vec::new();
    let mut ts_hit_index = Vec::new();
    let mut starts = vec![0u32; n_active];
    let mut counts = vec![0u32; n_active];
    for station in 0..n_active {
        starts[station] = hits.len() as u32;
        counts[station] = by_station[station].len() as u32;
        for (global_idx, hit) in by_station[station].drain(..) {
            hits.push(hit);
            ts_hit_index.push(global_idx);
        }
    }

    window.reset_for_window(hits, starts, counts, ts_hit_index);
}

/// `PrepareGrid` (§4.4 step 2, re-run as step 3a's "rebuild grids" for every
/// iteration after the first): bin widths are `clamp(0.3 * size / sqrt(1 +
/// nHits), 0.01 * dz, 0.3 * dz)` with `dz = |stationZ - targetZ|`, narrower
/// for dense stations and never below 1% or above 30% of the drift to the
/// target. Hits already claimed via `hitKeyUsed` are skipped, so calling
/// this again after a CA iteration naturally re-excludes them.
pub fn prepare_grid(window: &mut WindowState, params: &Parameters) {
    let n_active = params.active_station_count();
    for station in 0..n_active {
        let (lo, hi) = window.station_hit_range(station);
        let hits: Vec<Hit> = window.hits()[lo..hi].to_vec();

        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for h in &hits {
            x_min = x_min.min(h.x);
            x_max = x_max.max(h.x);
            y_min = y_min.min(h.y);
            y_max = y_max.max(h.y);
        }
        if hits.is_empty() {
            x_min = 0.0;
            x_max = 0.0;
            y_min = 0.0;
            y_max = 0.0;
        }

        let dz = (params.stations[station].z - params.target.z).abs().max(1e-6);
        let n_hits = hits.len() as f64;
        let x_step = (0.3 * (x_max - x_min).max(0.0) / (1.0 + n_hits).sqrt()).clamp(0.01 * dz, 0.3 * dz);
        let y_step = (0.3 * (y_max - y_min).max(0.0) / (1.0 + n_hits).sqrt()).clamp(0.01 * dz, 0.3 * dz);

        let mut grid = Grid::build_bins(x_min, x_max, y_min, y_max, x_step, y_step);
        grid.store_hits(&hits, lo as u32, window.hit_key_used());
        *window.grid_mut(station) = grid;
    }
}

/// After an iteration, near-duplicate hits the triplet constructor flagged
/// suppressed are folded permanently into `hitKeyUsed` (§4.4 step e): once
/// propagated they are excluded from every later grid rebuild in this
/// window, same as a hit a winning branch actually claimed.
fn propagate_suppressed_keys(window: &mut WindowState) {
    for local in 0..window.hits().len() {
        if window.is_hit_suppressed(local) {
            let hit = *window.hit(local);
            window.mark_keys_used(hit.front_key, hit.back_key);
        }
    }
}

/// Runs the full per-window pipeline over an already-`ReadWindowData`
/// `window`: `PrepareGrid`, the per-iteration CA loop (triplet seeding,
/// optional `TrackExtender`, suppressed-key propagation), a first
/// `FitTracks` pass, `MergeClones`, and a second `FitTracks` pass that
/// re-fits *every* emitted track, merged or not (§4.4 steps 2-6). Finished
/// tracks are pushed onto `window` via `WindowState::push_reco_track`.
pub fn run_window(window: &mut WindowState, params: &Parameters, counters: &WindowCounters) {
    let mut hit_lists: Vec<Vec<HitId>> = Vec::new();

    for iteration in &params.iterations {
        prepare_grid(window, params);

        let winners = tf_seed::run_iteration(window, params, iteration);
        counters.add_candidates_survived(winners.len() as u64);

        for mut branch in winners {
            if iteration.extend_tracks {
                let before = branch.n_hits();
                tf_extend::extend_branch(window, params, iteration, &mut branch);
                if branch.n_hits() > before {
                    counters.add_tracks_extended(1);
                }
            }

            for &h in branch.hits() {
                let hit = window.hit(h as usize);
                window.mark_keys_used(hit.front_key, hit.back_key);
            }

            hit_lists.push(branch.hits().to_vec());
        }

        propagate_suppressed_keys(window);
    }

    let tracks: Vec<Track> = hit_lists
        .iter()
        .map(|hits| {
            let track = tf_fit::fit_track(window, params, hits);
            counters.add_tracks_fitted(1);
            track
        })
        .collect();

    let merged_hit_lists = tf_merge::merge_clones(window, params, &tracks, &hit_lists);
    let n_merged = hit_lists.len().saturating_sub(merged_hit_lists.len());
    counters.add_clones_merged(n_merged as u64);

    for hits in &merged_hit_lists {
        let track = tf_fit::fit_track(window, params, hits);
        counters.add_tracks_fitted(1);
        window.push_reco_track(track, hits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_config::Iteration;
    use tf_model::{FieldSlice, HitKey, Station};
    use tf_state::HitStoreBuilder;

    fn station(id: u16, z: f64) -> Station {
        Station { detector_id: id, z, field_present: false, time_info: true, x_max: 50.0, y_max: 50.0, field_slice: FieldSlice::zero() }
    }

    fn hit(id: u32, station: u16, x: f64, y: f64, z: f64, t: f64, front: HitKey, back: HitKey) -> Hit {
        Hit {
            id,
            station,
            x,
            y,
            z,
            t,
            dx2: 0.02 * 0.02,
            dy2: 0.02 * 0.02,
            dxy: 0.0,
            dt2: 0.05 * 0.05,
            range_x: 0.1,
            range_y: 0.1,
            range_t: 0.3,
            front_key: front,
            back_key: back,
        }
    }

    fn five_station_params() -> Parameters {
        let mut params = Parameters::default_cbm_like();
        params.stations = vec![station(0, 10.0), station(1, 30.0), station(2, 50.0), station(3, 70.0), station(4, 90.0)];
        let mut it = Iteration::default_primary();
        it.min_nhits = 4;
        it.min_nhits_station0 = 4;
        params.iterations = vec![it];
        params
    }

    #[test]
    fn read_window_data_partitions_by_station_and_filters_by_time() {
        let params = five_station_params();
        let hits = vec![
            hit(0, 0, 2.0, 1.0, 10.0, 5.0, 0, 1),
            hit(1, 1, 6.0, 3.0, 30.0, 5.0, 2, 3),
            hit(2, 0, 0.0, 0.0, 10.0, 500.0, 4, 5),
        ];
        let store = HitStoreBuilder::new(6).with_hits(hits).with_stream_starts(vec![0]).build().unwrap();

        let mut window = WindowState::new(5, 6);
        read_window_data(&store, &params, 0.0, 100.0, &mut window);

        assert_eq!(window.hits().len(), 2);
        assert_eq!(window.station_hits(0).len(), 1);
        assert_eq!(window.station_hits(1).len(), 1);
    }

    #[test]
    fn run_window_reconstructs_a_straight_track_end_to_end() {
        let params = five_station_params();
        let hits = vec![
            hit(0, 0, 2.0, 1.0, 10.0, 1.0, 0, 1),
            hit(1, 1, 6.0, 3.0, 30.0, 1.0, 2, 3),
            hit(2, 2, 10.0, 5.0, 50.0, 1.0, 4, 5),
            hit(3, 3, 14.0, 7.0, 70.0, 1.0, 6, 7),
            hit(4, 4, 18.0, 9.0, 90.0, 1.0, 8, 9),
        ];
        let store = HitStoreBuilder::new(10).with_hits(hits).with_stream_starts(vec![0]).build().unwrap();

        let mut window = WindowState::new(5, 10);
        read_window_data(&store, &params, 0.0, 10.0, &mut window);

        let counters = WindowCounters::new();
        run_window(&mut window, &params, &counters);

        assert_eq!(window.reco_tracks().len(), 1);
        assert_eq!(window.reco_tracks()[0].n_hits, 5);
        let mut owned: Vec<HitId> = window.reco_hit_indices().to_vec();
        owned.sort_unstable();
        assert_eq!(owned, vec![0, 1, 2, 3, 4]);
    }
}
