//! Cellular-automaton track seeding: triplet construction, neighbour
//! linking, and winner-take-all candidate competition (§3, §4.4).
//!
//! Grounded on `CaTripletConstructor` and `CaTrackFinderWindow`'s triplet
//! stage. Station grids (`WindowState::grid`) are assumed already populated
//! by the caller's `PrepareGrid` step; this crate only reads them.

mod candidate;
mod constructor;
mod neighbours;
mod triplet_store;

pub use candidate::{create_track_candidates, run_competition_loop, select_tracks};
pub use constructor::{construct_triplets_for_hit, TripletConstructionResult};
pub use neighbours::search_neighbours;
pub use triplet_store::TripletStore;

use tf_config::{Iteration, Parameters};
use tf_model::Branch;
use tf_state::WindowState;

/// Builds every triplet reachable from `window`'s hits for one iteration,
/// grouped by left-hit (§4.4 step b). Near-duplicate middle-station hits
/// found along the way are marked suppressed on `window` as they are
/// discovered (§4.3 "detect near-duplicates... mark them suppressed").
fn build_triplet_store(window: &mut WindowState, params: &Parameters, iteration: &Iteration) -> TripletStore {
    let n_active = params.active_station_count();
    let max_gap = iteration.max_station_gap as usize;
    let mut store = TripletStore::new(n_active, window.hits().len());

    if n_active < 3 {
        return store;
    }

    for sl in 0..=n_active - 3 {
        let (lo, hi) = window.station_hit_range(sl);
        for hit_l_local in lo..hi {
            let hit_l = window.hit(hit_l_local);
            if window.is_key_used(hit_l.front_key) || window.is_key_used(hit_l.back_key) {
                continue;
            }

            let mut triplets_for_hit = Vec::new();
            let mut suppressed = Vec::new();
            let sm_max = (sl + 1 + max_gap).min(n_active - 2);
            for sm in sl + 1..=sm_max {
                let sr_max = (sm + 1 + max_gap).min(n_active - 1);
                for sr in sm + 1..=sr_max {
                    let result = construct_triplets_for_hit(window, params, iteration, sl, sm, sr, hit_l_local);
                    triplets_for_hit.extend(result.triplets);
                    suppressed.extend(result.suppressed_hits);
                }
            }
            for local in suppressed {
                window.suppress_hit(local);
            }
            store.push_group_for_hit(sl, hit_l_local, triplets_for_hit);
        }
    }

    store
}

/// `CreateTracks` (§4.4 step d-f driver): runs the candidate search for
/// decreasing `firstTripletLevel` thresholds down to the iteration's minimum
/// chain length, so longer chains are claimed before shorter ones compete
/// for the hits they overlap on.
fn create_tracks(window: &mut WindowState, store: &TripletStore, iteration: &Iteration, n_active: usize) -> Vec<Branch> {
    let min_level = iteration.min_nhits.max(iteration.min_nhits_station0) as i32 - 3;
    let top = n_active as i32 - 3;
    let mut winners = Vec::new();
    let mut first_triplet_level = top;

    while first_triplet_level >= min_level {
        let mut candidates = Vec::new();
        create_track_candidates(
            window,
            store,
            iteration,
            first_triplet_level.max(0) as u16,
            min_level,
            n_active,
            &mut candidates,
        );
        run_competition_loop(window, &mut candidates);
        winners.extend(select_tracks(window, candidates));
        first_triplet_level -= 1;
    }

    winners
}

/// Runs one full CA iteration over `window`: triplet construction, neighbour
/// linking, and the `CreateTracks` competition loop. Returns the winning
/// candidates (window-local hit lists, not yet extended or fitted) and
/// permanently marks their hit keys as used on `window`.
pub fn run_iteration(window: &mut WindowState, params: &Parameters, iteration: &Iteration) -> Vec<Branch> {
    let n_active = params.active_station_count();
    let mut store = build_triplet_store(window, params, iteration);
    search_neighbours(&mut store, iteration, 0);
    create_tracks(window, &store, iteration, n_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_grid::Grid;
    use tf_model::{FieldSlice, Hit, HitKey, Station};

    fn station(id: u16, z: f64) -> Station {
        Station { detector_id: id, z, field_present: false, time_info: true, x_max: 50.0, y_max: 50.0, field_slice: FieldSlice::zero() }
    }

    fn hit(id: u32, x: f64, y: f64, z: f64, front: HitKey, back: HitKey) -> Hit {
        Hit {
            id,
            station: 0,
            x,
            y,
            z,
            t: 0.0,
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

    #[test]
    fn straight_line_event_yields_one_reconstructed_track() {
        let mut params = Parameters::default_cbm_like();
        params.stations = vec![station(0, 10.0), station(1, 30.0), station(2, 50.0)];
        params.iterations = vec![{
            let mut it = Iteration::default_primary();
            it.min_nhits = 3;
            it.min_nhits_station0 = 3;
            it
        }];

        // A straight line from the target through x = 0.2*z, y = 0.1*z.
        let hits = vec![hit(0, 2.0, 1.0, 10.0, 0, 1), hit(1, 6.0, 3.0, 30.0, 2, 3), hit(2, 10.0, 5.0, 50.0, 4, 5)];

        let mut window = WindowState::new(3, 10);
        window.reset_for_window(hits.clone(), vec![0, 1, 2], vec![1, 1, 1], vec![900, 901, 902]);

        for (station_idx, h) in hits.iter().enumerate() {
            let mut grid = Grid::build_bins(-60.0, 60.0, -60.0, 60.0, 5.0, 5.0);
            grid.store_hits(std::slice::from_ref(h), station_idx as u32, &[]);
            *window.grid_mut(station_idx) = grid;
        }

        let winners = run_iteration(&mut window, &params, &params.iterations[0]);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].n_hits(), 3);
    }
}
