//! Final bidirectional Kalman fit over a track's hits, producing parameters
//! at the first-hit, last-hit and primary-vertex planes (§4.6 `TrackFitter`).
//!
//! The reference fitter batches `W` tracks per call as a struct-of-SIMD-
//! vectors; per §9 ("scalar implementations should be correct even if
//! slower") this port fits one track per call and lets the caller
//! (`rayon`-parallelise across tracks in `tf-engine`) recover the
//! cross-track parallelism instead.

use tf_config::Parameters;
use tf_field::{apply_energy_loss, apply_multiple_scattering, extrapolate, filter_time, filter_xy, Direction, FieldRegion};
use tf_model::{HitId, KalmanState, Station, Track};
use tf_state::WindowState;

const RADIATION_LENGTH_X0: f64 = 0.01;

fn momentum_guess(state: &KalmanState) -> f64 {
    if state.qp.abs() > 1e-6 {
        1.0 / state.qp.abs()
    } else {
        1.0
    }
}

/// Field region for the step from `before` (the previous visited station, if
/// any) through `at` to `to`, mirroring the triplet constructor's two- and
/// three-point regions (§9 "three distinct field regions").
fn step_region(before: Option<&Station>, at: &Station, to: &Station) -> FieldRegion {
    match before {
        Some(b) => FieldRegion::from_stations(b, at, to),
        None => FieldRegion::new(at.z, at.field_slice.clone(), to.z, to.field_slice.clone(), to.z, to.field_slice.clone()),
    }
}

/// One sweep over `order` (hits already arranged start-to-end for this
/// sweep's direction), seeded with a loose straight-line state with the
/// given `qp` guess at the first hit in `order`, filtering every hit into
/// the state in turn.
fn sweep(window: &WindowState, params: &Parameters, order: &[HitId], direction: Direction, seed_qp: f64) -> KalmanState {
    let first_hit = window.hit(order[0] as usize);
    let first_station = &params.stations[first_hit.station as usize];

    let mut state = KalmanState::loose(first_hit.z);
    state.t = first_hit.t;
    state.qp = seed_qp;
    if seed_qp == 0.0 {
        state.set_c(4, 4, 1.0e4);
    } else {
        state.set_c(4, 4, (seed_qp * 0.5).powi(2).max(1e-6));
    }
    if order.len() > 1 {
        let second_hit = window.hit(order[1] as usize);
        let dz = second_hit.z - first_hit.z;
        if dz.abs() > 1e-9 {
            state.tx = (second_hit.x - first_hit.x) / dz;
            state.ty = (second_hit.y - first_hit.y) / dz;
        }
    }
    filter_xy(&mut state, first_hit.x, first_hit.y, first_hit.dx2, first_hit.dy2, first_hit.dxy);
    filter_time(&mut state, first_hit.t, first_hit.dt2, first_station.time_info);

    let mut prev_station: Option<&Station> = None;
    let mut cur_station = first_station;

    for &h in &order[1..] {
        let hit = window.hit(h as usize);
        let target_station = &params.stations[hit.station as usize];
        let field = step_region(prev_station, cur_station, target_station);

        state = extrapolate(&state, hit.z, &field);
        apply_multiple_scattering(&mut state, RADIATION_LENGTH_X0, momentum_guess(&state));
        apply_energy_loss(&mut state, RADIATION_LENGTH_X0, direction);
        filter_xy(&mut state, hit.x, hit.y, hit.dx2, hit.dy2, hit.dxy);
        filter_time(&mut state, hit.t, hit.dt2, target_station.time_info);

        prev_station = Some(cur_station);
        cur_station = target_station;
    }

    state
}

/// `TrackFitter` (§4.6): fits `hits` (window-local indices, ascending by
/// station) and returns the finished [`Track`]. The backward pass runs
/// twice (linearisation refit, each restarting the momentum guess from the
/// first pass's estimate); the forward pass runs once, symmetric to the
/// reference's description. The "global" tracking mode's extra PV
/// iteration is not modeled (no such mode exists in this port, see
/// DESIGN.md); the PV plane is filled from a single vertex update after the
/// backward pass.
pub fn fit_track(window: &WindowState, params: &Parameters, hits: &[HitId]) -> Track {
    let mut backward_order: Vec<HitId> = hits.to_vec();
    backward_order.reverse();

    let pass1 = sweep(window, params, &backward_order, Direction::Backward, 0.0);
    let pass2 = sweep(window, params, &backward_order, Direction::Backward, pass1.qp);
    let params_first = pass2;

    let target = &params.target;
    let first_hit_station = &params.stations[window.hit(hits[0] as usize).station as usize];
    let field_to_target = FieldRegion::new(first_hit_station.z, first_hit_station.field_slice.clone(), target.z, tf_model::FieldSlice::zero(), target.z, tf_model::FieldSlice::zero());
    let mut params_pv = extrapolate(&params_first, target.z, &field_to_target);
    filter_xy(&mut params_pv, target.x, target.y, target.sigma_x * target.sigma_x, target.sigma_y * target.sigma_y, 0.0);

    let forward_order: Vec<HitId> = hits.to_vec();
    let params_last = sweep(window, params, &forward_order, Direction::Forward, params_first.qp);

    Track::new(hits.len() as u32, params_first, params_last, params_pv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_config::{Iteration, Parameters};
    use tf_model::{FieldSlice, Hit, HitKey, Station};

    fn station(id: u16, z: f64) -> Station {
        Station { detector_id: id, z, field_present: false, time_info: true, x_max: 50.0, y_max: 50.0, field_slice: FieldSlice::zero() }
    }

    fn hit(id: u32, station: u16, x: f64, y: f64, z: f64, front: HitKey, back: HitKey) -> Hit {
        Hit {
            id,
            station,
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
    fn fits_a_straight_no_field_track_near_exactly() {
        let mut params = Parameters::default_cbm_like();
        params.stations = vec![station(0, 10.0), station(1, 30.0), station(2, 50.0), station(3, 70.0), station(4, 90.0)];
        params.iterations = vec![Iteration::default_primary()];

        let hits = vec![
            hit(0, 0, 2.0, 1.0, 10.0, 0, 1),
            hit(1, 1, 6.0, 3.0, 30.0, 2, 3),
            hit(2, 2, 10.0, 5.0, 50.0, 4, 5),
            hit(3, 3, 14.0, 7.0, 70.0, 6, 7),
            hit(4, 4, 18.0, 9.0, 90.0, 8, 9),
        ];
        let mut window = WindowState::new(5, 10);
        window.reset_for_window(hits, vec![0, 1, 2, 3, 4], vec![1, 1, 1, 1, 1], vec![900, 901, 902, 903, 904]);

        let track = fit_track(&window, &params, &[0, 1, 2, 3, 4]);
        assert_eq!(track.n_hits, 5);
        assert!((track.params_first.x - 2.0).abs() < 1e-2);
        assert!((track.params_last.x - 18.0).abs() < 1e-2);
        assert!(track.is_well_formed());
    }
}
