//! Grows track candidates over linked triplets and resolves hit ownership
//! (§3, grounded on `CaTrackFinderWindow::CreateTrackCandidates`,
//! `CAFindTrack`, `DoCompetitionLoop` and `SelectTracks`).

use tf_config::Iteration;
use tf_model::ids::TripletId;
use tf_model::Branch;
use tf_state::WindowState;

use crate::neighbours::triplets_link;
use crate::triplet_store::TripletStore;

/// Recursively walks the neighbour chain starting at `id`, accumulating hits
/// and chi-square into `branch`. Consecutive triplets share two hits
/// (`neighbour.hit_l == triplet.hit_m`, `neighbour.hit_m == triplet.hit_r`),
/// so only one new hit is ever introduced per node: `hit_l` at the root
/// (nothing shared yet) and `hit_m` at every node thereafter, with the
/// final leaf also contributing its own `hit_r`, the one hit no later node
/// exists to share it with. At a leaf triplet (`level == 0`) the branch is
/// finalized and compared against `best` with [`Branch::is_better_than`];
/// `min_best_l` from the reference implementation is intentionally not
/// modeled since the guard that would have used it is commented out there
/// too (see DESIGN.md).
fn find_track(store: &TripletStore, iteration: &Iteration, id: TripletId, mut branch: Branch, best: &mut Option<Branch>) {
    let triplet = store.triplet(id);
    if branch.n_hits() == 0 {
        branch.add_hit(triplet.hit_l);
    }
    branch.add_hit(triplet.hit_m);
    branch.set_chi2(branch.chi2() + triplet.chi2);

    if triplet.level == 0 {
        branch.add_hit(triplet.hit_r);
        if best.as_ref().map_or(true, |b| branch.is_better_than(b)) {
            *best = Some(branch);
        }
        return;
    }

    let first = TripletId::from_raw(triplet.neighbour_first);
    for k in 0..triplet.neighbour_count as usize {
        let neighbour_id = TripletId::new(first.station(), first.index() + k);
        let neighbour = store.triplet(neighbour_id);
        let (matches, dchi2) = triplets_link(triplet, neighbour, iteration);
        if !matches {
            continue;
        }
        let mut child = branch.clone();
        child.set_chi2(child.chi2() + dchi2);
        find_track(store, iteration, neighbour_id, child, best);
    }
}

/// `CreateTrackCandidates` (§4.4 step d): for every still-unclaimed triplet
/// whose chain reaches at least `first_triplet_level`, runs the DFS and
/// keeps the best resulting branch that survives the post-search hit-count
/// and ghost-suppression checks. Appends dead (`is_alive() == false`)
/// candidates to `candidates`, numbering each with its index in that vector.
pub fn create_track_candidates(
    window: &WindowState,
    store: &TripletStore,
    iteration: &Iteration,
    first_triplet_level: u16,
    min_level: i32,
    max_hits: usize,
    candidates: &mut Vec<Branch>,
) {
    for station in 0..store.n_stations() {
        let count = store.station_triplets(station).len();
        for index in 0..count {
            let id = TripletId::new(station, index);
            let triplet = store.triplet(id);
            if triplet.level < first_triplet_level {
                continue;
            }
            if 3 + triplet.level as i32 < iteration.min_nhits as i32 {
                continue;
            }

            let hit_l = window.hit(triplet.hit_l as usize);
            if window.is_key_used(hit_l.front_key) || window.is_key_used(hit_l.back_key) {
                continue;
            }

            let seed = Branch::new(candidates.len() as u32, max_hits);
            let mut best: Option<Branch> = None;
            find_track(store, iteration, id, seed, &mut best);

            let Some(mut winner) = best else { continue };
            let n_hits = winner.n_hits();
            if n_hits < first_triplet_level as usize + 2 {
                continue;
            }
            if (n_hits as i32) < min_level + 3 {
                continue;
            }
            if (n_hits as u16) < iteration.min_nhits {
                continue;
            }

            let ndf = n_hits as i32 * 2 - 5;
            let chi2_per_ndf = if ndf > 0 { winner.chi2() / ndf as f64 } else { f64::INFINITY };

            if n_hits == 3 {
                if !iteration.primary_flag && station != 0 {
                    continue;
                }
                if iteration.primary_flag && chi2_per_ndf > 5.0 {
                    continue;
                }
            }

            winner.set_station(station as u16);
            winner.set_chi2(chi2_per_ndf);
            winner.set_alive(false);
            candidates.push(winner);
        }
    }
}

/// `DoCompetitionLoop` (§4.4 step e): winner-take-all claiming of hit strip
/// keys, bounded at 100 passes (the reference's own bound). A dead candidate
/// claims a key if it is free or held by a weaker dead candidate -- never one
/// held by an already-alive candidate, whose ownership is final -- and a
/// dead candidate is promoted to alive once every one of its keys still
/// points back to itself.
pub fn run_competition_loop(window: &WindowState, candidates: &mut [Branch]) {
    let n_keys = window.hit_key_used().len();
    let mut owner: Vec<Option<usize>> = vec![None; n_keys];

    for _pass in 0..100 {
        for idx in 0..candidates.len() {
            if candidates[idx].is_alive() {
                continue;
            }
            for &h in candidates[idx].hits().to_vec().iter() {
                let hit = window.hit(h as usize);
                for key in [hit.front_key, hit.back_key] {
                    match owner[key as usize] {
                        None => owner[key as usize] = Some(idx),
                        Some(cur) if cur != idx && !candidates[cur].is_alive() && candidates[idx].is_better_than(&candidates[cur]) => {
                            owner[key as usize] = Some(idx);
                        }
                        _ => {}
                    }
                }
            }
        }

        let mut promoted = false;
        for idx in 0..candidates.len() {
            if candidates[idx].is_alive() {
                continue;
            }
            let owns_all = candidates[idx].hits().to_vec().iter().all(|&h| {
                let hit = window.hit(h as usize);
                owner[hit.front_key as usize] == Some(idx) && owner[hit.back_key as usize] == Some(idx)
            });
            if owns_all {
                candidates[idx].set_alive(true);
                promoted = true;
            } else {
                for &h in candidates[idx].hits().to_vec().iter() {
                    let hit = window.hit(h as usize);
                    if owner[hit.front_key as usize] == Some(idx) {
                        owner[hit.front_key as usize] = None;
                    }
                    if owner[hit.back_key as usize] == Some(idx) {
                        owner[hit.back_key as usize] = None;
                    }
                }
            }
        }

        if !promoted {
            break;
        }
    }
}

/// `SelectTracks` (§4.4 step f): marks every hit key owned by a surviving
/// alive candidate as permanently used and returns the winning branches.
/// Track extension ([`TripletConstructionResult`](crate::constructor) ->
/// extended hit list) and the final Kalman fit happen downstream of this
/// crate (`tf-extend`, `tf-fit`) -- a dead candidate here is just a list of
/// window-local hit indices, not yet a fitted [`tf_model::Track`].
pub fn select_tracks(window: &mut WindowState, candidates: Vec<Branch>) -> Vec<Branch> {
    let mut winners = Vec::new();
    for candidate in candidates {
        if !candidate.is_alive() {
            continue;
        }
        for &h in candidate.hits() {
            let hit = window.hit(h as usize);
            window.mark_keys_used(hit.front_key, hit.back_key);
        }
        winners.push(candidate);
    }
    winners
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_model::{Hit, HitKey, TripletMomentum, Triplet};

    fn hit(id: u32, front: HitKey, back: HitKey) -> Hit {
        Hit {
            id,
            station: 0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            t: 0.0,
            dx2: 1.0,
            dy2: 1.0,
            dxy: 0.0,
            dt2: 1.0,
            range_x: 0.1,
            range_y: 0.1,
            range_t: 1.0,
            front_key: front,
            back_key: back,
        }
    }

    fn leaf_triplet(hit_l: u32, hit_m: u32, hit_r: u32, sl: u16) -> Triplet {
        Triplet {
            hit_l,
            hit_m,
            hit_r,
            station_l: sl,
            station_m: sl + 1,
            station_r: sl + 2,
            chi2: 1.0,
            momentum: TripletMomentum::Momentum { qp: 0.1, c_qp: 0.01 },
            level: 0,
            neighbour_first: 0,
            neighbour_count: 0,
        }
    }

    fn iteration() -> Iteration {
        let mut it = Iteration::default_primary();
        it.min_nhits = 3;
        it
    }

    #[test]
    fn single_triplet_survives_as_a_candidate() {
        let mut store = TripletStore::new(3, 3);
        store.push_group_for_hit(0, 0, vec![leaf_triplet(0, 1, 2, 0)]);

        let mut window = WindowState::new(3, 10);
        window.reset_for_window(vec![hit(0, 0, 1), hit(1, 2, 3), hit(2, 4, 5)], vec![0, 1, 2], vec![1, 1, 1], vec![100, 101, 102]);

        let mut candidates = Vec::new();
        create_track_candidates(&window, &store, &iteration(), 0, 0, 16, &mut candidates);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].n_hits(), 3);
        assert!(!candidates[0].is_alive());

        run_competition_loop(&window, &mut candidates);
        assert!(candidates[0].is_alive());

        let winners = select_tracks(&mut window, candidates);
        assert_eq!(winners.len(), 1);
        assert!(window.is_key_used(0));
        assert!(window.is_key_used(5));
    }

    #[test]
    fn chain_of_three_linked_triplets_yields_five_distinct_hits() {
        fn momentum_triplet(hit_l: u32, hit_m: u32, hit_r: u32, sl: u16) -> Triplet {
            Triplet {
                hit_l,
                hit_m,
                hit_r,
                station_l: sl,
                station_m: sl + 1,
                station_r: sl + 2,
                chi2: 1.0,
                momentum: TripletMomentum::Momentum { qp: 0.1, c_qp: 0.01 },
                level: 0,
                neighbour_first: 0,
                neighbour_count: 0,
            }
        }

        // station 0: hits 0,1,2 ; station 1: hits 1,2,3 ; station 2: hits 2,3,4.
        let mut store = TripletStore::new(3, 5);
        store.push_group_for_hit(0, 0, vec![momentum_triplet(0, 1, 2, 0)]);
        store.push_group_for_hit(1, 1, vec![momentum_triplet(1, 2, 3, 1)]);
        store.push_group_for_hit(2, 2, vec![momentum_triplet(2, 3, 4, 2)]);
        crate::neighbours::search_neighbours(&mut store, &iteration(), 0);

        let mut window = WindowState::new(3, 10);
        window.reset_for_window(
            vec![hit(0, 0, 1), hit(1, 2, 3), hit(2, 4, 5), hit(3, 6, 7), hit(4, 8, 9)],
            vec![0, 1, 2],
            vec![1, 1, 1],
            vec![100, 101, 102, 103, 104],
        );

        let mut candidates = Vec::new();
        create_track_candidates(&window, &store, &iteration(), 0, 0, 16, &mut candidates);
        assert_eq!(candidates.len(), 1);
        let mut hits = candidates[0].hits().to_vec();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1, 2, 3, 4], "no hit should be duplicated across the chain");
    }

    #[test]
    fn competing_candidates_sharing_a_key_yield_one_winner() {
        // Two independent 3-hit candidates share hit 1's front key (key 2).
        let mut store = TripletStore::new(3, 4);
        store.push_group_for_hit(0, 0, vec![leaf_triplet(0, 1, 2, 0)]);
        store.push_group_for_hit(0, 3, vec![leaf_triplet(3, 1, 2, 0)]);

        let mut window = WindowState::new(3, 10);
        window.reset_for_window(
            vec![hit(0, 0, 1), hit(1, 2, 3), hit(2, 4, 5), hit(3, 6, 2)],
            vec![0, 1, 1],
            vec![2, 1, 1],
            vec![100, 101, 102, 103],
        );

        let mut candidates = Vec::new();
        create_track_candidates(&window, &store, &iteration(), 0, 0, 16, &mut candidates);
        assert_eq!(candidates.len(), 2);

        run_competition_loop(&window, &mut candidates);
        let alive_count = candidates.iter().filter(|c| c.is_alive()).count();
        assert_eq!(alive_count, 1);
    }
}
