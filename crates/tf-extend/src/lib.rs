//! Extends an alive branch outward on both ends, absorbing compatible unused
//! hits station by station (§4.5 `TrackExtender`).

use tf_config::{Iteration, Parameters};
use tf_field::{apply_multiple_scattering, extrapolate, filter_time, filter_xy, FieldRegion};
use tf_grid::GridArea;
use tf_model::{Branch, HitId, KalmanState};
use tf_state::WindowState;

const RADIATION_LENGTH_X0: f64 = 0.01;

fn momentum_guess(state: &KalmanState) -> f64 {
    if state.qp.abs() > 1e-6 {
        1.0 / state.qp.abs()
    } else {
        1.0
    }
}

/// Refits `hits` (window-local, already sorted by station) start to end with
/// a loose straight-line seed at the first hit, returning the state at every
/// hit's plane. The state at index 0 seeds the upstream walk; the state at
/// the last index seeds the downstream walk (the "outside-in sweep" -- a
/// single forward pass read from both ends, rather than two independent
/// fits, see DESIGN.md).
fn refit_along(window: &WindowState, params: &Parameters, hits: &[HitId]) -> Vec<KalmanState> {
    let mut states = Vec::with_capacity(hits.len());
    let first = window.hit(hits[0] as usize);
    let mut state = KalmanState::loose(first.z);
    state.tx = 0.0;
    state.ty = 0.0;
    state.t = first.t;
    filter_xy(&mut state, first.x, first.y, first.dx2, first.dy2, first.dxy);
    filter_time(&mut state, first.t, first.dt2, params.stations[first.station as usize].time_info);
    states.push(state.clone());

    for &h in &hits[1..] {
        let hit = window.hit(h as usize);
        let station = &params.stations[hit.station as usize];
        let field = FieldRegion::new(state.z, params.stations[0].field_slice.clone(), hit.z, station.field_slice.clone(), hit.z, station.field_slice.clone());
        state = extrapolate(&state, hit.z, &field);
        apply_multiple_scattering(&mut state, RADIATION_LENGTH_X0, momentum_guess(&state));
        filter_xy(&mut state, hit.x, hit.y, hit.dx2, hit.dy2, hit.dxy);
        filter_time(&mut state, hit.t, hit.dt2, station.time_info);
        states.push(state.clone());
    }
    states
}

/// Gathers the single nearest compatible hit on `station` around `state`,
/// gated by `pick_gather`/`max_dz` and the doublet chi-square cut, or `None`
/// if nothing qualifies.
fn nearest_hit(window: &WindowState, params: &Parameters, iteration: &Iteration, station: usize, state: &KalmanState) -> Option<usize> {
    let grid = window.grid(station);
    let half_dx = (iteration.pick_gather * state.c(0, 0)).max(0.0).sqrt() + grid.max_range_x() + iteration.max_dz * state.tx.abs();
    let half_dy = (iteration.pick_gather * state.c(1, 1)).max(0.0).sqrt() + grid.max_range_y() + iteration.max_dz * state.ty.abs();
    let mut area = GridArea::new(grid, state.x, state.y, half_dx, half_dy);

    let station_info = &params.stations[station];
    let mut best: Option<(usize, f64)> = None;
    while let Some(object_id) = area.next_object_id() {
        let local = object_id as usize;
        if window.is_hit_suppressed(local) {
            continue;
        }
        let hit = window.hit(local);
        if window.is_key_used(hit.front_key) || window.is_key_used(hit.back_key) {
            continue;
        }
        if station_info.time_info && state.ndf_time >= 0 {
            let dt_allow = 3.5 * state.c(5, 5).max(0.0).sqrt() + hit.range_t;
            if (state.t - hit.t).abs() > dt_allow {
                continue;
            }
        }
        let chi2 = tf_field::chi2_xy(state, hit.x, hit.y, hit.dx2, hit.dy2, hit.dxy);
        if !(chi2 < iteration.doublet_chi2_cut) {
            continue;
        }
        if best.map_or(true, |(_, best_chi2)| chi2 < best_chi2) {
            best = Some((local, chi2));
        }
    }
    best.map(|(local, _)| local)
}

/// Walks from `state` (already at `start_station`'s plane) outward in steps
/// of `step` (`+1` downstream, `-1` upstream), appending the nearest
/// compatible hit found at each station and stopping at the first station
/// with none. Returns the absorbed hits in the order visited.
fn walk(window: &WindowState, params: &Parameters, iteration: &Iteration, mut state: KalmanState, start_station: usize, step: isize) -> Vec<HitId> {
    let mut absorbed = Vec::new();
    let n = params.active_station_count() as isize;
    let mut station = start_station as isize + step;

    while station >= 0 && station < n {
        let target = &params.stations[station as usize];
        let field = FieldRegion::new(state.z, params.stations[start_station].field_slice.clone(), target.z, target.field_slice.clone(), target.z, target.field_slice.clone());
        let next = extrapolate(&state, target.z, &field);
        if !next.is_well_formed() {
            break;
        }
        let mut candidate_state = next.clone();
        apply_multiple_scattering(&mut candidate_state, RADIATION_LENGTH_X0, momentum_guess(&candidate_state));

        let Some(local) = nearest_hit(window, params, iteration, station as usize, &candidate_state) else {
            break;
        };

        let hit = window.hit(local);
        filter_xy(&mut candidate_state, hit.x, hit.y, hit.dx2, hit.dy2, hit.dxy);
        filter_time(&mut candidate_state, hit.t, hit.dt2, target.time_info);
        if !candidate_state.is_well_formed() {
            break;
        }

        absorbed.push(local as HitId);
        state = candidate_state;
        station += step;
    }

    absorbed
}

/// `TrackExtender::ExtendBranch` (§4.5): refits `branch` along its current
/// hits, then walks both ends outward absorbing compatible unused hits.
/// Rewrites `branch`'s hit list and starting station in place.
pub fn extend_branch(window: &WindowState, params: &Parameters, iteration: &Iteration, branch: &mut Branch) {
    let hits: Vec<HitId> = branch.hits().to_vec();
    if hits.is_empty() {
        return;
    }

    let states = refit_along(window, params, &hits);
    let first_station = window.hit(hits[0] as usize).station as usize;
    let last_station = window.hit(*hits.last().unwrap() as usize).station as usize;

    let mut upstream = walk(window, params, iteration, states[0].clone(), first_station, -1);
    let downstream = walk(window, params, iteration, states[states.len() - 1].clone(), last_station, 1);

    upstream.reverse();
    let mut new_hits = upstream;
    new_hits.extend(hits.iter().copied());
    new_hits.extend(downstream);

    let new_station = new_hits.first().map(|&h| window.hit(h as usize).station).unwrap_or(branch.station());
    branch.reset_hits();
    for h in new_hits {
        branch.add_hit(h);
    }
    branch.set_station(new_station);
}
