//! Per-station triplet storage with O(1) left-hit -> triplet-group lookup
//! (§4.4 step b: "Pack the results into per-station triplet arrays; for each
//! `ihL` store (first triplet id, count)").

use tf_model::ids::TripletId;
use tf_model::Triplet;

/// All triplets built in one iteration, grouped by the station of their
/// left hit, plus a window-hit-indexed lookup from a left hit to the
/// contiguous run of triplets that start there.
#[derive(Debug, Default)]
pub struct TripletStore {
    by_station: Vec<Vec<Triplet>>,
    hit_first: Vec<Option<TripletId>>,
    hit_count: Vec<u32>,
}

impl TripletStore {
    /// Allocates empty storage for `n_stations` active stations and
    /// `n_window_hits` hits in the current window.
    pub fn new(n_stations: usize, n_window_hits: usize) -> Self {
        Self {
            by_station: (0..n_stations).map(|_| Vec::new()).collect(),
            hit_first: vec![None; n_window_hits],
            hit_count: vec![0; n_window_hits],
        }
    }

    pub fn station_triplets(&self, station: usize) -> &[Triplet] {
        &self.by_station[station]
    }

    pub fn triplet(&self, id: TripletId) -> &Triplet {
        &self.by_station[id.station()][id.index()]
    }

    pub fn triplet_mut(&mut self, id: TripletId) -> &mut Triplet {
        &mut self.by_station[id.station()][id.index()]
    }

    /// Appends every triplet built for one left hit (all on the same
    /// station `sl`), contiguously, and records the `(first, count)` group
    /// for `hit_window_index` so [`TripletStore::neighbour_group`] can find
    /// it in O(1).
    pub fn push_group_for_hit(&mut self, sl: usize, hit_window_index: usize, triplets: Vec<Triplet>) {
        if triplets.is_empty() {
            return;
        }
        let start_index = self.by_station[sl].len();
        let count = triplets.len() as u32;
        self.by_station[sl].extend(triplets);
        self.hit_first[hit_window_index] = Some(TripletId::new(sl, start_index));
        self.hit_count[hit_window_index] = count;
    }

    /// The contiguous run of triplets whose left hit is `hit_window_index`,
    /// empty if that hit never started a triplet.
    pub fn neighbour_group(&self, hit_window_index: usize) -> &[Triplet] {
        match self.hit_first[hit_window_index] {
            None => &[],
            Some(first) => {
                let count = self.hit_count[hit_window_index] as usize;
                &self.by_station[first.station()][first.index()..first.index() + count]
            }
        }
    }

    pub fn neighbour_group_ids(&self, hit_window_index: usize) -> (Option<TripletId>, u32) {
        (self.hit_first[hit_window_index], self.hit_count[hit_window_index])
    }

    pub fn n_stations(&self) -> usize {
        self.by_station.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_model::TripletMomentum;

    fn triplet(hit_l: u32, hit_m: u32, hit_r: u32) -> Triplet {
        Triplet {
            hit_l,
            hit_m,
            hit_r,
            station_l: 0,
            station_m: 1,
            station_r: 2,
            chi2: 1.0,
            momentum: TripletMomentum::Momentum { qp: 0.1, c_qp: 0.01 },
            level: 0,
            neighbour_first: 0,
            neighbour_count: 0,
        }
    }

    #[test]
    fn groups_are_contiguous_and_lookup_by_hit_works() {
        let mut store = TripletStore::new(3, 4);
        store.push_group_for_hit(0, 0, vec![triplet(0, 1, 2), triplet(0, 1, 3)]);
        store.push_group_for_hit(0, 1, vec![triplet(1, 2, 3)]);
        assert_eq!(store.neighbour_group(0).len(), 2);
        assert_eq!(store.neighbour_group(1).len(), 1);
        assert_eq!(store.neighbour_group(2).len(), 0);
        assert_eq!(store.station_triplets(0).len(), 3);
    }
}
