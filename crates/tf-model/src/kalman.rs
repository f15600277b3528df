//! The Kalman track state shared by seeding, extension, and fitting.
//!
//! State vector order is fixed across the whole crate: `(x, y, tx, ty, qp,
//! t, vi)` where `vi = 1/v` is the inverse velocity. The 7x7 covariance uses
//! `ndarray` the way the closest physics-analog crates in the corpus do
//! (parton-distribution and radio-interferometry codebases both reach for
//! `ndarray` for small dense matrices rather than hand-rolled arrays).

use ndarray::Array2;

/// Dimension of the Kalman state vector.
pub const STATE_DIM: usize = 7;

/// A Kalman track state at one z-plane: parameters plus their covariance.
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanState {
    pub x: f64,
    pub y: f64,
    pub tx: f64,
    pub ty: f64,
    pub qp: f64,
    pub t: f64,
    pub vi: f64,
    /// Symmetric 7x7 covariance matrix over `(x, y, tx, ty, qp, t, vi)`.
    pub cov: Array2<f64>,
    pub z: f64,
    pub ndf: i32,
    pub ndf_time: i32,
}

impl KalmanState {
    /// A state with a very loose diagonal covariance, used to seed a fit
    /// before any hit has been incorporated.
    pub fn loose(z: f64) -> Self {
        let mut cov = Array2::zeros((STATE_DIM, STATE_DIM));
        // Matches the fitter's convention for "no information" slots: a large
        // but finite variance so missing measurements contribute ~nothing.
        for i in 0..STATE_DIM {
            cov[[i, i]] = 1.0e4;
        }
        Self { x: 0.0, y: 0.0, tx: 0.0, ty: 0.0, qp: 0.0, t: 0.0, vi: 0.0, cov, z, ndf: -5, ndf_time: -1 }
    }

    pub fn c(&self, i: usize, j: usize) -> f64 {
        self.cov[[i, j]]
    }

    pub fn set_c(&mut self, i: usize, j: usize, value: f64) {
        self.cov[[i, j]] = value;
        self.cov[[j, i]] = value;
    }

    /// True iff every covariance diagonal entry is finite and non-negative
    /// and every state component is finite. Used to implement the
    /// "non-finite / negative covariance => skip" rule from §7.
    pub fn is_well_formed(&self) -> bool {
        let params_finite =
            [self.x, self.y, self.tx, self.ty, self.qp, self.t, self.vi].iter().all(|v| v.is_finite());
        let diag_ok = (0..STATE_DIM).all(|i| {
            let d = self.cov[[i, i]];
            d.is_finite() && d >= 0.0
        });
        params_finite && diag_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_state_is_well_formed() {
        let state = KalmanState::loose(10.0);
        assert!(state.is_well_formed());
    }

    #[test]
    fn detects_negative_diagonal() {
        let mut state = KalmanState::loose(10.0);
        state.cov[[2, 2]] = -1.0;
        assert!(!state.is_well_formed());
    }

    #[test]
    fn detects_non_finite_param() {
        let mut state = KalmanState::loose(10.0);
        state.qp = f64::NAN;
        assert!(!state.is_well_formed());
    }

    #[test]
    fn set_c_keeps_symmetry() {
        let mut state = KalmanState::loose(0.0);
        state.set_c(0, 4, 0.25);
        assert_eq!(state.c(0, 4), state.c(4, 0));
    }
}
