//! `TrackFinder` (§4.8): slides a time window across a time-slice's hits,
//! running [`crate::pipeline::run_window`] once per window, and resolves
//! the overlap between consecutive windows by ownership of each track's
//! last hit rather than by which window holds the most of its hits.

use rayon::prelude::*;
use tf_config::Parameters;
use tf_events::{WindowCounters, WindowCountersSnapshot};
use tf_model::{HitId, Track};
use tf_state::{HitStore, WindowState};

use crate::pipeline::{read_window_data, run_window};

/// One lane's windows are processed strictly in time order on a single
/// `WindowState`, so `hitKeyUsed` keeps growing monotonically the way §3
/// requires within one thread; lanes themselves run across `rayon`'s pool.
fn run_lane(store: &HitStore, params: &Parameters, window_length: f64, stride: f64, n_windows: usize, window_indices: &[usize], tx: &crossbeam_channel::Sender<(u64, WindowCountersSnapshot)>) -> (Vec<Track>, Vec<HitId>) {
    let n_active = params.active_station_count();
    let mut window = WindowState::new(n_active, store.n_hit_keys());
    let counters = WindowCounters::new();

    let mut lane_tracks = Vec::new();
    let mut lane_hit_indices = Vec::new();

    for &w in window_indices {
        let start = w as f64 * stride;
        let end = start + window_length;
        read_window_data(store, params, start, end, &mut window);
        run_window(&mut window, params, &counters);

        let snapshot = counters.report_and_reset(w as u64);
        let _ = tx.send((w as u64, snapshot));

        // Last window of the slice owns every track, so nothing past the
        // end of the slice is silently dropped for want of a next window.
        let core_hi = if w + 1 >= n_windows { f64::INFINITY } else { start + stride };

        let mut owned_offset = 0usize;
        for track in window.reco_tracks() {
            let n = track.n_hits as usize;
            let owned_hits = &window.reco_hit_indices()[owned_offset..owned_offset + n];
            owned_offset += n;

            if track.params_last.t >= start && track.params_last.t < core_hi {
                lane_tracks.push(track.clone());
                lane_hit_indices.extend_from_slice(owned_hits);
            }
        }
    }

    (lane_tracks, lane_hit_indices)
}

/// Reconstructs every track in `store` by sliding a `window_length`-wide
/// window across it with the given `stride`, fanning the windows out across
/// `n_lanes` worker lanes (`rayon`'s coarse-grained window parallelism, §9).
/// Returns the finished tracks alongside the packed owned-hit-index array
/// (§6 `Vector<Track>` / `Vector<HitIndex>`): track `i` owns
/// `hit_indices[sum(n_hits[..i])..sum(n_hits[..=i])]`.
pub fn find_tracks(store: &HitStore, params: &Parameters, window_length: f64, stride: f64, n_lanes: usize) -> (Vec<Track>, Vec<HitId>) {
    if store.n_hits() == 0 || window_length <= 0.0 || stride <= 0.0 {
        return (Vec::new(), Vec::new());
    }

    let max_t = store.hits().iter().map(|h| h.t).fold(f64::MIN, f64::max);
    let n_windows = (max_t / stride).floor() as usize + 1;
    let lanes = n_lanes.max(1);

    let assignments: Vec<Vec<usize>> = (0..lanes).map(|lane| (lane..n_windows).step_by(lanes).collect()).collect();

    let (tx, rx) = crossbeam_channel::unbounded::<(u64, WindowCountersSnapshot)>();
    let reporter = std::thread::spawn(move || {
        while let Ok((window_index, snapshot)) = rx.recv() {
            tracing::info!(
                target: "tf_engine::driver",
                window_index,
                tracks_fitted = snapshot.tracks_fitted,
                clones_merged = snapshot.clones_merged,
                candidates_survived_competition = snapshot.candidates_survived_competition,
                "window processed"
            );
        }
    });

    let results: Vec<(Vec<Track>, Vec<HitId>)> =
        assignments.into_par_iter().map(|window_indices| run_lane(store, params, window_length, stride, n_windows, &window_indices, &tx)).collect();

    drop(tx);
    reporter.join().expect("counter reporter thread panicked");

    let mut all_tracks = Vec::new();
    let mut all_hit_indices = Vec::new();
    for (tracks, hits) in results {
        all_tracks.extend(tracks);
        all_hit_indices.extend(hits);
    }
    (all_tracks, all_hit_indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_config::Iteration;
    use tf_model::{FieldSlice, Hit, HitKey, Station};
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
    fn finds_a_single_track_within_one_window() {
        let params = five_station_params();
        let hits = vec![
            hit(0, 0, 2.0, 1.0, 10.0, 50.0, 0, 1),
            hit(1, 1, 6.0, 3.0, 30.0, 50.0, 2, 3),
            hit(2, 2, 10.0, 5.0, 50.0, 50.0, 4, 5),
            hit(3, 3, 14.0, 7.0, 70.0, 50.0, 6, 7),
            hit(4, 4, 18.0, 9.0, 90.0, 50.0, 8, 9),
        ];
        let store = HitStoreBuilder::new(10).with_hits(hits).with_stream_starts(vec![0]).build().unwrap();

        let (tracks, hit_indices) = find_tracks(&store, &params, 100.0, 100.0, 1);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].n_hits, 5);
        let mut owned = hit_indices.clone();
        owned.sort_unstable();
        assert_eq!(owned, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_store_yields_no_tracks() {
        let store = HitStoreBuilder::new(0).build().unwrap();
        let params = five_station_params();
        let (tracks, hit_indices) = find_tracks(&store, &params, 100.0, 100.0, 2);
        assert!(tracks.is_empty());
        assert!(hit_indices.is_empty());
    }
}
