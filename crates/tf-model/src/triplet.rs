//! The 3-hit seed (§3) produced by `TripletConstructor`.

use crate::hit::HitId;
use crate::ids::TripletId;

/// Either a fitted momentum or, when no field is present, a fitted slope
/// pair. `TripletConstructor` always fills exactly one of these two shapes,
/// selected once up front by `is_momentum_fitted`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TripletMomentum {
    Momentum { qp: f64, c_qp: f64 },
    Slope { tx: f64, c_tx: f64, ty: f64, c_ty: f64 },
}

/// A 3-hit seed on stations `s_l < s_m < s_r`.
#[derive(Debug, Clone, PartialEq)]
pub struct Triplet {
    pub hit_l: HitId,
    pub hit_m: HitId,
    pub hit_r: HitId,
    pub station_l: u16,
    pub station_m: u16,
    pub station_r: u16,
    pub chi2: f64,
    pub momentum: TripletMomentum,
    /// Longest downstream triplet-chain length reachable from this triplet;
    /// 0 for leaves (no neighbours). Filled by `SearchNeighbours`.
    pub level: u16,
    /// Contiguous range `[first, first + count)` into the next station's
    /// triplet array, holding this triplet's neighbours.
    pub neighbour_first: u32,
    pub neighbour_count: u32,
}

impl Triplet {
    pub fn is_momentum_fitted(&self) -> bool {
        matches!(self.momentum, TripletMomentum::Momentum { .. })
    }

    /// `Qp` and its variance if momentum was fitted; `None` for a
    /// slope-only (no-field) triplet.
    pub fn qp(&self) -> Option<(f64, f64)> {
        match self.momentum {
            TripletMomentum::Momentum { qp, c_qp } => Some((qp, c_qp)),
            TripletMomentum::Slope { .. } => None,
        }
    }

    pub fn slopes(&self) -> Option<(f64, f64, f64, f64)> {
        match self.momentum {
            TripletMomentum::Slope { tx, c_tx, ty, c_ty } => Some((tx, c_tx, ty, c_ty)),
            TripletMomentum::Momentum { .. } => None,
        }
    }

    /// Index within this triplet's own station's array -- used to build the
    /// packed id a downstream neighbour search stores as a back-reference.
    pub fn packed_id(&self, index_in_station: usize) -> TripletId {
        TripletId::new(self.station_l as usize, index_in_station)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Triplet {
        Triplet {
            hit_l: 0,
            hit_m: 1,
            hit_r: 2,
            station_l: 0,
            station_m: 1,
            station_r: 2,
            chi2: 1.5,
            momentum: TripletMomentum::Momentum { qp: 0.2, c_qp: 0.01 },
            level: 0,
            neighbour_first: 0,
            neighbour_count: 0,
        }
    }

    #[test]
    fn momentum_fitted_triplet_exposes_qp() {
        let t = sample();
        assert!(t.is_momentum_fitted());
        assert_eq!(t.qp(), Some((0.2, 0.01)));
        assert_eq!(t.slopes(), None);
    }

    #[test]
    fn slope_triplet_exposes_slopes() {
        let mut t = sample();
        t.momentum = TripletMomentum::Slope { tx: 0.1, c_tx: 0.02, ty: -0.1, c_ty: 0.02 };
        assert!(!t.is_momentum_fitted());
        assert_eq!(t.qp(), None);
        assert_eq!(t.slopes(), Some((0.1, 0.02, -0.1, 0.02)));
    }
}
