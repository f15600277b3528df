//! Kalman-state transport through a [`FieldRegion`] (§4.3, §4.6, §9).
//!
//! Equations of motion parameterised by `z` (standard for a forward
//! fixed-target spectrometer, as in the reference tracker):
//! ```text
//! dx/dz = Tx
//! dy/dz = Ty
//! dTx/dz = q/p * c * sqrt(1+Tx^2+Ty^2) * (Tx*Ty*Bx - (1+Tx^2)*By + Ty*Bz)
//! dTy/dz = q/p * c * sqrt(1+Tx^2+Ty^2) * ((1+Ty^2)*Bx - Tx*Ty*By - Tx*Bz)
//! dt/dz  = vi * sqrt(1+Tx^2+Ty^2)
//! ```
//! integrated with one classical RK4 step per call (the region spans at most
//! a few station gaps, so a single step is accurate to the level the triplet
//! and fit stages need). Covariance is transported by a numeric (central
//! finite-difference) Jacobian of this same step rather than an
//! analytically-derived one: the reference fitter's protocol only requires
//! the transport be consistent and symmetric-covariance-preserving, and a
//! numeric Jacobian keeps this module independent of any one station's field
//! order.

use crate::region::FieldRegion;
use ndarray::Array2;
use tf_model::physics::SPEED_OF_LIGHT;
use tf_model::{KalmanState, STATE_DIM};

/// Step size for the central-difference Jacobian, chosen small relative to
/// typical track parameter scales (cm, radians-of-slope, GeV^-1).
const JACOBIAN_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Vector5 {
    x: f64,
    y: f64,
    tx: f64,
    ty: f64,
    t: f64,
}

fn derivative(v: Vector5, qp: f64, vi: f64, field: &FieldRegion, z: f64) -> Vector5 {
    let (bx, by, bz) = field.eval(v.x, v.y, z);
    let norm = (1.0 + v.tx * v.tx + v.ty * v.ty).sqrt();
    let kappa = qp * SPEED_OF_LIGHT * norm;
    Vector5 {
        x: v.tx,
        y: v.ty,
        tx: kappa * (v.tx * v.ty * bx - (1.0 + v.tx * v.tx) * by + v.ty * bz),
        ty: kappa * ((1.0 + v.ty * v.ty) * bx - v.tx * v.ty * by - v.tx * bz),
        t: vi * norm,
    }
}

fn add(a: Vector5, b: Vector5, scale: f64) -> Vector5 {
    Vector5 { x: a.x + scale * b.x, y: a.y + scale * b.y, tx: a.tx + scale * b.tx, ty: a.ty + scale * b.ty, t: a.t + scale * b.t }
}

/// One RK4 step of the five transported quantities `(x, y, tx, ty, t)` from
/// `z0` to `z1`, holding `qp` and `vi` fixed over the step.
fn rk4_step(v0: Vector5, qp: f64, vi: f64, field: &FieldRegion, z0: f64, z1: f64) -> Vector5 {
    let h = z1 - z0;
    let k1 = derivative(v0, qp, vi, field, z0);
    let k2 = derivative(add(v0, k1, h / 2.0), qp, vi, field, z0 + h / 2.0);
    let k3 = derivative(add(v0, k2, h / 2.0), qp, vi, field, z0 + h / 2.0);
    let k4 = derivative(add(v0, k3, h), qp, vi, field, z1);
    Vector5 {
        x: v0.x + h / 6.0 * (k1.x + 2.0 * k2.x + 2.0 * k3.x + k4.x),
        y: v0.y + h / 6.0 * (k1.y + 2.0 * k2.y + 2.0 * k3.y + k4.y),
        tx: v0.tx + h / 6.0 * (k1.tx + 2.0 * k2.tx + 2.0 * k3.tx + k4.tx),
        ty: v0.ty + h / 6.0 * (k1.ty + 2.0 * k2.ty + 2.0 * k3.ty + k4.ty),
        t: v0.t + h / 6.0 * (k1.t + 2.0 * k2.t + 2.0 * k3.t + k4.t),
    }
}

/// Transports `state` from its current `z` to `z_new` through `field`,
/// propagating the covariance with a numeric Jacobian of the RK4 step.
/// Multiple scattering and energy loss are *not* applied here; callers add
/// those separately (§4.3 step 5, §4.6 step 2) since they depend on the
/// traversed material, not the field alone.
pub fn extrapolate(state: &KalmanState, z_new: f64, field: &FieldRegion) -> KalmanState {
    let full = |params: [f64; 7]| -> [f64; 7] {
        let [x, y, tx, ty, qp, t, vi] = params;
        let stepped = rk4_step(Vector5 { x, y, tx, ty, t }, qp, vi, field, state.z, z_new);
        [stepped.x, stepped.y, stepped.tx, stepped.ty, qp, stepped.t, vi]
    };

    let base = [state.x, state.y, state.tx, state.ty, state.qp, state.t, state.vi];
    let out = full(base);

    let mut jacobian = Array2::zeros((STATE_DIM, STATE_DIM));
    for col in 0..STATE_DIM {
        let mut plus = base;
        let mut minus = base;
        let eps = JACOBIAN_EPS.max(base[col].abs() * JACOBIAN_EPS);
        plus[col] += eps;
        minus[col] -= eps;
        let f_plus = full(plus);
        let f_minus = full(minus);
        for row in 0..STATE_DIM {
            jacobian[[row, col]] = (f_plus[row] - f_minus[row]) / (2.0 * eps);
        }
    }

    let new_cov = jacobian.dot(&state.cov).dot(&jacobian.t());

    KalmanState {
        x: out[0],
        y: out[1],
        tx: out[2],
        ty: out[3],
        qp: out[4],
        t: out[5],
        vi: out[6],
        cov: new_cov,
        z: z_new,
        ndf: state.ndf,
        ndf_time: state.ndf_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_in_zero_field_keeps_slopes() {
        let field = FieldRegion::zero(0.0);
        let mut state = KalmanState::loose(0.0);
        state.x = 1.0;
        state.tx = 0.1;
        state.ty = -0.05;
        let out = extrapolate(&state, 10.0, &field);
        assert!((out.tx - 0.1).abs() < 1e-9);
        assert!((out.ty - (-0.05)).abs() < 1e-9);
        assert!((out.x - (1.0 + 0.1 * 10.0)).abs() < 1e-6);
        assert_eq!(out.z, 10.0);
    }

    #[test]
    fn extrapolation_preserves_covariance_symmetry() {
        let field = FieldRegion::zero(0.0);
        let state = KalmanState::loose(0.0);
        let out = extrapolate(&state, 5.0, &field);
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                assert!((out.cov[[i, j]] - out.cov[[j, i]]).abs() < 1e-6);
            }
        }
    }
}
