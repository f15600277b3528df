//! `TripletConstructor` (§4.3): builds every viable triplet starting from
//! one left hit, grounded on `CaTripletConstructor.cxx`'s `FindDoublets` /
//! `FindTripletHits` / `FindTriplets` / `SelectTriplets` sequence.
//!
//! The reference constructor runs this per-hit search over SIMD batches of
//! left hits; this port processes one left hit per call and lets the
//! caller (`ConstructTriplets` in `crate::iteration`) fan out across hits
//! and station triples.

use tf_config::{Iteration, Parameters};
use tf_field::{apply_multiple_scattering, extrapolate, filter_time, filter_xy, FieldRegion};
use tf_grid::{Grid, GridArea};
use tf_model::{FieldSlice, Hit, KalmanState, Station, Triplet, TripletMomentum};
use tf_state::WindowState;

/// Uniform per-station material budget (fraction of a radiation length) the
/// seed builder assumes when applying multiple scattering. `spec.md` does
/// not define a material map, so every station crossing is treated as the
/// same thin scatterer -- the same order-of-magnitude simplification
/// `tf_field`'s scattering/energy-loss tests already use.
const STATION_RADIATION_LENGTH_X0: f64 = 0.01;

/// Triplets built for one left hit, plus the hits on the middle station
/// that turned out to be near-duplicates of an already-collected doublet
/// and should be marked suppressed by the caller.
#[derive(Debug, Default)]
pub struct TripletConstructionResult {
    pub triplets: Vec<Triplet>,
    pub suppressed_hits: Vec<usize>,
}

fn momentum_guess(state: &KalmanState) -> f64 {
    if state.qp.abs() > 1e-6 {
        1.0 / state.qp.abs()
    } else {
        1.0
    }
}

/// Quantizes a coordinate to a tight grid for near-duplicate detection
/// (§4.3 "detect near-duplicates ... within tight windows in x,y,t").
fn quantize(v: f64) -> i64 {
    (v * 1.0e3).round() as i64
}

/// Gated grid walk shared by the doublet and triplet steps (`CollectHits`):
/// widens the search box by the state's own covariance and the iteration's
/// `pick`/`max_dz`, then applies the time, position and chi2 gates in turn.
fn collect_hits(
    window: &WindowState,
    station: &Station,
    grid: &Grid,
    state: &KalmanState,
    pick: f64,
    max_dz: f64,
    chi2_cut: f64,
    max_candidates: usize,
) -> Vec<usize> {
    let half_dx = (pick * state.c(0, 0)).max(0.0).sqrt() + grid.max_range_x() + max_dz * state.tx.abs();
    let half_dy = (pick * state.c(1, 1)).max(0.0).sqrt() + grid.max_range_y() + max_dz * state.ty.abs();

    let mut area = GridArea::new(grid, state.x, state.y, half_dx, half_dy);
    let mut out = Vec::new();
    while let Some(object_id) = area.next_object_id() {
        if out.len() >= max_candidates {
            break;
        }
        let local = object_id as usize;
        if window.is_hit_suppressed(local) {
            continue;
        }
        let hit = window.hit(local);

        if station.time_info && state.ndf_time >= 0 {
            let dt_allow = 3.5 * state.c(5, 5).max(0.0).sqrt() + hit.range_t;
            if (state.t - hit.t).abs() > dt_allow {
                continue;
            }
        }

        let dx_allow = (pick * state.c(0, 0)).max(0.0).sqrt() + hit.range_x;
        if (hit.x - state.x).abs() > dx_allow {
            continue;
        }
        let dy_allow = (pick * state.c(1, 1)).max(0.0).sqrt() + hit.range_y;
        if (hit.y - state.y).abs() > dy_allow {
            continue;
        }

        let chi2 = tf_field::chi2_xy(state, hit.x, hit.y, hit.dx2, hit.dy2, hit.dxy);
        if !(chi2 < chi2_cut) {
            continue;
        }

        out.push(local);
    }
    out
}

/// Refits the three-hit track twice, downstream (L->M->R) then upstream
/// (R->M->L), each time starting from `Q/p=0`, to obtain a stable momentum
/// estimate (§4.3 "refit the three-hit track twice"). Returns the final
/// (upstream-pass) state at the left station plane and that pass's total
/// chi-square.
fn refit_triplet(
    at_l: &KalmanState,
    hit_m: &Hit,
    hit_r: &Hit,
    hit_l: &Hit,
    station_l: &Station,
    station_m: &Station,
    station_r: &Station,
    field_lm: &FieldRegion,
    field_lmr: &FieldRegion,
) -> (KalmanState, f64) {
    let mut downstream = at_l.clone();
    downstream.qp = 0.0;
    downstream.set_c(4, 4, 1.0e4);

    let mut at_m = extrapolate(&downstream, station_m.z, field_lm);
    apply_multiple_scattering(&mut at_m, STATION_RADIATION_LENGTH_X0, momentum_guess(&at_m));
    filter_xy(&mut at_m, hit_m.x, hit_m.y, hit_m.dx2, hit_m.dy2, hit_m.dxy);
    filter_time(&mut at_m, hit_m.t, hit_m.dt2, station_m.time_info);

    let mut at_r = extrapolate(&at_m, station_r.z, field_lmr);
    apply_multiple_scattering(&mut at_r, STATION_RADIATION_LENGTH_X0, momentum_guess(&at_r));
    filter_xy(&mut at_r, hit_r.x, hit_r.y, hit_r.dx2, hit_r.dy2, hit_r.dxy);
    filter_time(&mut at_r, hit_r.t, hit_r.dt2, station_r.time_info);

    // Upstream pass: restart from Q/p=0 at the right hit and walk back.
    let mut upstream = at_r.clone();
    upstream.qp = 0.0;
    upstream.set_c(4, 4, 1.0e4);
    upstream.ndf = -5;
    upstream.ndf_time = -1;

    let mut back_at_m = extrapolate(&upstream, station_m.z, field_lmr);
    apply_multiple_scattering(&mut back_at_m, STATION_RADIATION_LENGTH_X0, momentum_guess(&back_at_m));
    let chi2_m = filter_xy(&mut back_at_m, hit_m.x, hit_m.y, hit_m.dx2, hit_m.dy2, hit_m.dxy);
    let chi2_tm = filter_time(&mut back_at_m, hit_m.t, hit_m.dt2, station_m.time_info);

    let mut back_at_l = extrapolate(&back_at_m, station_l.z, field_lm);
    apply_multiple_scattering(&mut back_at_l, STATION_RADIATION_LENGTH_X0, momentum_guess(&back_at_l));
    let chi2_l = filter_xy(&mut back_at_l, hit_l.x, hit_l.y, hit_l.dx2, hit_l.dy2, hit_l.dxy);
    let chi2_tl = filter_time(&mut back_at_l, hit_l.t, hit_l.dt2, station_l.time_info);

    (back_at_l, chi2_m + chi2_tm + chi2_l + chi2_tl)
}

/// Builds every triplet rooted at window-local hit `hit_l_local` on station
/// `sl`, using middle/right stations `sm`/`sr` (`sl < sm < sr`, possibly
/// non-contiguous).
pub fn construct_triplets_for_hit(
    window: &WindowState,
    params: &Parameters,
    iteration: &Iteration,
    sl: usize,
    sm: usize,
    sr: usize,
    hit_l_local: usize,
) -> TripletConstructionResult {
    let station_l = &params.stations[sl];
    let station_m = &params.stations[sm];
    let station_r = &params.stations[sr];
    let target = &params.target;
    let hit_l = *window.hit(hit_l_local);

    let dz_target = hit_l.z - target.z;
    if dz_target.abs() < 1e-9 {
        return TripletConstructionResult::default();
    }

    // Seed a straight line from the target through the left hit, then fold
    // in the primary-vertex constraint as a Kalman update at the target
    // plane (§4.3).
    let mut seed = KalmanState::loose(target.z);
    let slope_err2 = (iteration.max_slope * iteration.max_slope) / 9.0;
    seed.tx = (hit_l.x - target.x) / dz_target;
    seed.ty = (hit_l.y - target.y) / dz_target;
    seed.t = hit_l.t;
    seed.set_c(2, 2, slope_err2);
    seed.set_c(3, 3, slope_err2);
    filter_xy(&mut seed, target.x, target.y, target.sigma_x * target.sigma_x, target.sigma_y * target.sigma_y, 0.0);

    let field_target_l =
        FieldRegion::new(target.z, FieldSlice::zero(), station_l.z, station_l.field_slice.clone(), station_l.z, station_l.field_slice.clone());
    let mut at_l = extrapolate(&seed, hit_l.z, &field_target_l);
    if !at_l.is_well_formed() {
        return TripletConstructionResult::default();
    }
    filter_xy(&mut at_l, hit_l.x, hit_l.y, hit_l.dx2, hit_l.dy2, hit_l.dxy);
    filter_time(&mut at_l, hit_l.t, hit_l.dt2, station_l.time_info);

    // Doublet step: propagate to sM through the target->sL field, gather
    // candidate middle hits.
    let field_lm =
        FieldRegion::new(station_l.z, station_l.field_slice.clone(), station_m.z, station_m.field_slice.clone(), station_m.z, station_m.field_slice.clone());
    let at_m = extrapolate(&at_l, station_m.z, &field_lm);
    if !at_m.is_well_formed() {
        return TripletConstructionResult::default();
    }

    let doublet_candidates = collect_hits(
        window,
        station_m,
        window.grid(sm),
        &at_m,
        iteration.pick,
        iteration.max_dz,
        iteration.doublet_chi2_cut,
        params.max_doublets_per_singlet as usize,
    );

    let field_lmr = FieldRegion::from_stations(station_l, station_m, station_r);
    let is_momentum_fitted = station_l.field_present || station_m.field_present || station_r.field_present;

    let mut seen_middle_keys: Vec<(i64, i64, i64)> = Vec::new();
    let mut result = TripletConstructionResult::default();

    for hit_m_local in doublet_candidates {
        let hit_m = *window.hit(hit_m_local);

        let key = (quantize(hit_m.x), quantize(hit_m.y), quantize(hit_m.t));
        if seen_middle_keys.contains(&key) {
            result.suppressed_hits.push(hit_m_local);
            continue;
        }
        seen_middle_keys.push(key);

        let mut doublet_state = at_m.clone();
        apply_multiple_scattering(&mut doublet_state, STATION_RADIATION_LENGTH_X0, momentum_guess(&doublet_state));
        filter_xy(&mut doublet_state, hit_m.x, hit_m.y, hit_m.dx2, hit_m.dy2, hit_m.dxy);
        filter_time(&mut doublet_state, hit_m.t, hit_m.dt2, station_m.time_info);
        if !doublet_state.is_well_formed() {
            continue;
        }

        // Triplet step: propagate through the 3-station field to sR.
        let at_r = extrapolate(&doublet_state, station_r.z, &field_lmr);
        if !at_r.is_well_formed() || at_r.tx.abs() > iteration.max_slope || at_r.ty.abs() > iteration.max_slope {
            continue;
        }

        let right_candidates = collect_hits(
            window,
            station_r,
            window.grid(sr),
            &at_r,
            iteration.pick,
            iteration.max_dz,
            iteration.triplet_chi2_cut,
            params.max_triplets_per_doublet as usize,
        );

        for hit_r_local in right_candidates {
            let hit_r = *window.hit(hit_r_local);
            let (final_state, chi2) =
                refit_triplet(&at_l, &hit_m, &hit_r, &hit_l, station_l, station_m, station_r, &field_lm, &field_lmr);

            if !chi2.is_finite() || chi2 < 0.0 || chi2 > iteration.triplet_final_chi2_cut {
                continue;
            }

            let momentum = if is_momentum_fitted {
                TripletMomentum::Momentum { qp: final_state.qp, c_qp: final_state.c(4, 4) + 0.001 }
            } else {
                TripletMomentum::Slope {
                    tx: final_state.tx,
                    c_tx: final_state.c(2, 2),
                    ty: final_state.ty,
                    c_ty: final_state.c(3, 3),
                }
            };

            result.triplets.push(Triplet {
                hit_l: hit_l_local as u32,
                hit_m: hit_m_local as u32,
                hit_r: hit_r_local as u32,
                station_l: sl as u16,
                station_m: sm as u16,
                station_r: sr as u16,
                chi2,
                momentum,
                level: 0,
                neighbour_first: 0,
                neighbour_count: 0,
            });
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_config::Parameters;
    use tf_model::HitKey;

    fn hit(id: u32, station: u16, x: f64, y: f64, z: f64, t: f64, front: HitKey, back: HitKey) -> Hit {
        Hit {
            id,
            station,
            x,
            y,
            z,
            t,
            dx2: 0.01,
            dy2: 0.01,
            dxy: 0.0,
            dt2: 0.1,
            range_x: 0.2,
            range_y: 0.2,
            range_t: 1.0,
            front_key: front,
            back_key: back,
        }
    }

    fn setup_window(params: &Parameters, hits: Vec<Hit>) -> WindowState {
        let mut window = WindowState::new(params.active_station_count(), hits.len() as u32 + 1);
        let mut start = vec![0u32; params.active_station_count() + 1];
        let mut count = vec![0u32; params.active_station_count() + 1];
        for h in &hits {
            count[h.station as usize] += 1;
        }
        for s in 1..start.len() {
            start[s] = start[s - 1] + count[s - 1];
        }
        let ts_ids: Vec<u32> = hits.iter().map(|h| h.id).collect();
        window.reset_for_window(hits, start.clone(), count.clone(), ts_ids);
        for s in 0..params.active_station_count() {
            let station_hits = window.station_hits(s).to_vec();
            let station = &params.stations[s];
            let grid = Grid::build_bins(-station.x_max, station.x_max, -station.y_max, station.y_max, 2.0, 2.0);
            *window.grid_mut(s) = grid;
            window.grid_mut(s).store_hits(&station_hits, start[s], &[]);
        }
        window
    }

    #[test]
    fn builds_a_straight_line_triplet_with_no_field() {
        let mut params = Parameters::default_cbm_like();
        params.iterations[0].doublet_chi2_cut = 50.0;
        params.iterations[0].triplet_chi2_cut = 50.0;
        params.iterations[0].triplet_final_chi2_cut = 50.0;

        // A track from the target through stations 0,1,2 on a straight line.
        let hits = vec![
            hit(100, 0, 1.0, 1.0, params.stations[0].z, 0.0, 0, 1),
            hit(101, 1, 2.0, 2.0, params.stations[1].z, 0.0, 2, 3),
            hit(102, 2, 3.0, 3.0, params.stations[2].z, 0.0, 4, 5),
        ];
        let window = setup_window(&params, hits);

        let result = construct_triplets_for_hit(&window, &params, &params.iterations[0], 0, 1, 2, 0);
        assert_eq!(result.triplets.len(), 1);
        let t = &result.triplets[0];
        assert_eq!((t.hit_l, t.hit_m, t.hit_r), (0, 0, 0));
        assert!(!t.is_momentum_fitted());
        assert!(t.chi2 >= 0.0);
    }

    #[test]
    fn no_middle_hit_in_window_yields_no_triplets() {
        let mut params = Parameters::default_cbm_like();
        params.iterations[0].doublet_chi2_cut = 50.0;

        let hits = vec![hit(100, 0, 1.0, 1.0, params.stations[0].z, 0.0, 0, 1)];
        let window = setup_window(&params, hits);

        let result = construct_triplets_for_hit(&window, &params, &params.iterations[0], 0, 1, 2, 0);
        assert!(result.triplets.is_empty());
    }
}
