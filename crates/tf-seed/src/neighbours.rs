//! Links triplets across adjacent stations into chains (§3 `SearchNeighbours`,
//! grounded on `CaTrackFinderWindow::SearchNeighbors` /
//! `CaTrackFinderWindow::checkTripletMatch`).

use tf_config::Iteration;
use tf_model::ids::TripletId;
use tf_model::Triplet;

use crate::triplet_store::TripletStore;

/// Tests whether `upstream` (on the earlier station) may chain onto
/// `downstream` (on the later station): hit/station continuity, plus a
/// momentum- or slope-continuity chi-square gate against
/// `iteration.triplet_link_chi2`. Returns the match chi-square alongside the
/// verdict (`0.0` for the slope branch, matching the reference's unused
/// `0.5*(dtx^2/Ctx + dty^2/Cty)` formula being commented out in favor of a
/// flat `0.`).
pub(crate) fn triplets_link(upstream: &Triplet, downstream: &Triplet, iteration: &Iteration) -> (bool, f64) {
    if downstream.hit_m != upstream.hit_r {
        return (false, f64::INFINITY);
    }
    if downstream.hit_l != upstream.hit_m {
        return (false, f64::INFINITY);
    }
    if downstream.station_m != upstream.station_r {
        return (false, f64::INFINITY);
    }
    if downstream.station_l != upstream.station_m {
        return (false, f64::INFINITY);
    }

    let link_chi2 = iteration.triplet_link_chi2;

    if upstream.is_momentum_fitted() && downstream.is_momentum_fitted() {
        let (qp_u, c_qp_u) = upstream.qp().unwrap();
        let (qp_d, c_qp_d) = downstream.qp().unwrap();
        let dqp = qp_u - qp_d;
        let c_sum = c_qp_u + c_qp_d;
        if !dqp.is_finite() || !c_sum.is_finite() || c_sum <= 0.0 {
            return (false, f64::INFINITY);
        }
        if dqp * dqp > link_chi2 * c_sum {
            return (false, f64::INFINITY);
        }
        (true, dqp * dqp / c_sum)
    } else if !upstream.is_momentum_fitted() && !downstream.is_momentum_fitted() {
        let (tx_u, c_tx_u, ty_u, c_ty_u) = upstream.slopes().unwrap();
        let (tx_d, c_tx_d, ty_d, c_ty_d) = downstream.slopes().unwrap();
        let dtx = tx_u - tx_d;
        let c_tx = c_tx_u + c_tx_d;
        let dty = ty_u - ty_d;
        let c_ty = c_ty_u + c_ty_d;
        if !dtx.is_finite() || !dty.is_finite() || c_tx <= 0.0 || c_ty <= 0.0 {
            return (false, f64::INFINITY);
        }
        if dtx * dtx > link_chi2 * c_tx {
            return (false, f64::INFINITY);
        }
        if dty * dty > link_chi2 * c_ty {
            return (false, f64::INFINITY);
        }
        (true, 0.0)
    } else {
        // One triplet was momentum-fitted and the other wasn't -- the two
        // never chain (mixed field presence along the same station run).
        (false, f64::INFINITY)
    }
}

/// Links every triplet on stations `[first_station_index, n_stations - 2]` to
/// its matching neighbours one station downstream, filling in `level`,
/// `neighbour_first` and `neighbour_count` (§4.4 step c).
///
/// The stored `[neighbour_first, neighbour_first + neighbour_count)` range is
/// the *whole* candidate group the right hit produced (from
/// [`TripletStore::neighbour_group_ids`]), not trimmed down to only the
/// entries that actually pass [`triplets_link`] -- `CAFindTrack` re-validates
/// every neighbour in the range with the same test before using it, so
/// storing the full group is behaviourally equivalent to the reference's
/// trimmed range and only gives up a minor constant-factor search saving.
pub fn search_neighbours(store: &mut TripletStore, iteration: &Iteration, first_station_index: usize) {
    let n_stations = store.n_stations();
    if n_stations < 2 {
        return;
    }
    for station in (first_station_index..=n_stations - 2).rev() {
        let count = store.station_triplets(station).len();
        for index in 0..count {
            let id = TripletId::new(station, index);
            let hit_m = store.triplet(id).hit_m as usize;
            let (first, n_neighbours) = store.neighbour_group_ids(hit_m);

            let mut level = 0u16;
            if let Some(first_id) = first {
                for k in 0..n_neighbours as usize {
                    let neighbour_id = TripletId::new(first_id.station(), first_id.index() + k);
                    let (matches, _chi2) = triplets_link(store.triplet(id), store.triplet(neighbour_id), iteration);
                    if matches {
                        level = level.max(store.triplet(neighbour_id).level + 1);
                    }
                }
            }

            let t = store.triplet_mut(id);
            t.level = level;
            t.neighbour_first = first.map(TripletId::raw).unwrap_or(0);
            t.neighbour_count = if first.is_some() { n_neighbours } else { 0 };
        }
    }
}
