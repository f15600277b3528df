//! Fuses track fragments that belong to the same particle but were split
//! across a station gap during seeding (§4.7 `CloneMerger`).
//!
//! Operates on hit-owning pairs rather than [`Track`] alone: the winning
//! branch's parameters are produced here only to gate the merge decision,
//! not to become the emitted track's final fit -- `tf-engine` re-fits every
//! track (merged or not) after this pass, per §4.8's "the second FitTracks
//! after CloneMerger re-fits all tracks, not just the merged ones".

use ndarray::{Array1, Array2};
use tf_config::Parameters;
use tf_field::{extrapolate, FieldRegion};
use tf_model::{HitId, KalmanState, Track};
use tf_state::WindowState;

/// χ² acceptance threshold for a candidate merge (§4.7).
const MAX_MERGE_CHI2: f64 = 50.0;
/// Time-compatibility gate, in units of the combined time sigma (§4.7
/// "skip if time measurements are incompatible beyond 3σ").
const TIME_COMPAT_SIGMAS: f64 = 3.0;

/// State-vector indices merged on: `(x, y, tx, ty, qp)`, i.e. everything but
/// time and inverse velocity (§4.7 "5x5 symmetric filter that includes
/// momentum").
const MERGE_INDICES: [usize; 5] = [0, 1, 2, 3, 4];

fn component(state: &KalmanState, idx: usize) -> f64 {
    match idx {
        0 => state.x,
        1 => state.y,
        2 => state.tx,
        3 => state.ty,
        4 => state.qp,
        _ => unreachable!(),
    }
}

/// Inverts a symmetric positive-(semi)definite matrix via Cholesky
/// decomposition, clamping any diagonal pivot below `1e-12` rather than
/// failing (§4.7 "if a diagonal would be < 1e-12, clamp").
fn invert_symmetric(m: &Array2<f64>) -> Array2<f64> {
    let n = m.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = m[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                l[[i, j]] = sum.max(1e-12).sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    let mut l_inv = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        l_inv[[i, i]] = 1.0 / l[[i, i]].max(1e-12);
        for j in 0..i {
            let mut sum = 0.0;
            for k in j..i {
                sum -= l[[i, k]] * l_inv[[k, j]];
            }
            l_inv[[i, j]] = sum / l[[i, i]].max(1e-12);
        }
    }
    l_inv.t().dot(&l_inv)
}

/// χ² between two independent estimates of the same track state, combining
/// their covariances by direct sum (not a measurement filter: neither side
/// is "truth", so this is the symmetric track-to-track merge test rather
/// than [`tf_field::filter_xy`]'s asymmetric state-vs-hit update).
fn track_chi2(a: &KalmanState, b: &KalmanState) -> f64 {
    let residual = Array1::from_vec(MERGE_INDICES.iter().map(|&i| component(a, i) - component(b, i)).collect());
    let mut sum = Array2::<f64>::zeros((5, 5));
    for (r, &ri) in MERGE_INDICES.iter().enumerate() {
        for (c, &ci) in MERGE_INDICES.iter().enumerate() {
            sum[[r, c]] = a.c(ri, ci) + b.c(ri, ci);
        }
    }
    let inv = invert_symmetric(&sum);
    residual.dot(&inv.dot(&residual))
}

/// Propagates `downstream`'s first-hit state and `upstream`'s last-hit
/// state to their common midpoint `z` and returns the merge χ², or `None`
/// if the time-compatibility gate fails or either propagated state is
/// malformed.
fn merge_chi2(params: &Parameters, downstream: &Track, upstream: &Track, first_station_downstream: usize, last_station_upstream: usize) -> Option<f64> {
    let state_i = &downstream.params_first;
    let state_j = &upstream.params_last;

    let sigma_t = (state_i.c(5, 5).max(0.0) + state_j.c(5, 5).max(0.0)).sqrt();
    if sigma_t > 0.0 && (state_i.t - state_j.t).abs() > TIME_COMPAT_SIGMAS * sigma_t {
        return None;
    }

    let midpoint_z = 0.5 * (state_i.z + state_j.z);
    let mid_station = (last_station_upstream + first_station_downstream) / 2;
    let field = FieldRegion::from_stations(
        &params.stations[last_station_upstream],
        &params.stations[mid_station],
        &params.stations[first_station_downstream],
    );

    let propagated_i = extrapolate(state_i, midpoint_z, &field);
    let propagated_j = extrapolate(state_j, midpoint_z, &field);
    if !propagated_i.is_well_formed() || !propagated_j.is_well_formed() {
        return None;
    }

    Some(track_chi2(&propagated_i, &propagated_j))
}

struct Neighbour {
    partner: usize,
    chi2: f64,
    /// `true` if `partner` is the upstream half of this link.
    partner_is_upstream: bool,
}

/// `CloneMerger` (§4.7): given parallel `tracks`/`hit_lists` (window-local
/// hit indices, ascending by station), finds the best compatible
/// upstream/downstream pairing for each eligible track and fuses their hit
/// lists. Tracks with more than `N_active - 3` hits are never considered --
/// they are already complete enough that a split fragment is implausible.
/// Returns one hit list per emitted (possibly fused) track.
pub fn merge_clones(window: &WindowState, params: &Parameters, tracks: &[Track], hit_lists: &[Vec<HitId>]) -> Vec<Vec<HitId>> {
    let n = tracks.len();
    let n_active = params.active_station_count();
    let max_hits = n_active.saturating_sub(3);

    let eligible: Vec<bool> = hit_lists.iter().map(|h| !h.is_empty() && h.len() <= max_hits).collect();
    let first_station: Vec<usize> = hit_lists.iter().map(|h| if h.is_empty() { 0 } else { window.hit(h[0] as usize).station as usize }).collect();
    let last_station: Vec<usize> =
        hit_lists.iter().map(|h| if h.is_empty() { 0 } else { window.hit(*h.last().unwrap() as usize).station as usize }).collect();

    let mut neighbours: Vec<Option<Neighbour>> = (0..n).map(|_| None).collect();

    for i in 0..n {
        if !eligible[i] {
            continue;
        }
        for j in 0..n {
            if i == j || !eligible[j] {
                continue;
            }
            if first_station[i] <= last_station[j] {
                continue;
            }
            let Some(chi2) = merge_chi2(params, &tracks[i], &tracks[j], first_station[i], last_station[j]) else {
                continue;
            };
            if chi2 >= MAX_MERGE_CHI2 {
                continue;
            }
            let better_for_i = neighbours[i].as_ref().map_or(true, |cur| chi2 < cur.chi2);
            let better_for_j = neighbours[j].as_ref().map_or(true, |cur| chi2 < cur.chi2);
            if better_for_i && better_for_j {
                neighbours[i] = Some(Neighbour { partner: j, chi2, partner_is_upstream: true });
                neighbours[j] = Some(Neighbour { partner: i, chi2, partner_is_upstream: false });
            }
        }
    }

    let mut consumed = vec![false; n];
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let mut fused = hit_lists[i].clone();
        if let Some(link) = &neighbours[i] {
            if !consumed[link.partner] {
                consumed[link.partner] = true;
                if link.partner_is_upstream {
                    let mut merged = hit_lists[link.partner].clone();
                    merged.extend(fused.iter().copied());
                    fused = merged;
                } else {
                    fused.extend(hit_lists[link.partner].iter().copied());
                }
            }
        }
        out.push(fused);
    }
    out
}
