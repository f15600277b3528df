//! Linear Kalman measurement updates shared by the seed, extension and fit
//! stages (§4.3 "Update the Kalman state with the hit", §4.6 "filter (x,y)
//! and time"). All updates assume the measurement directly observes a
//! subset of state components (no off-diagonal projection), which holds for
//! every hit and vertex measurement in this model.

use ndarray::{Array1, Array2};
use tf_model::KalmanState;

/// Joint update of an arbitrary subset of state components against a
/// correlated measurement. `indices` names which state components are
/// observed, `residual[k] = measurement_k - state[indices[k]]`, and
/// `measurement_cov` is the measurement's own covariance (symmetric,
/// `indices.len()` square). Returns the chi-square contribution.
///
/// Standard linear KF update with an identity observation matrix restricted
/// to `indices`: `S = C[indices,indices] + V`, `K = C[:,indices] S^-1`,
/// `x += K r`, `C -= K C[indices,:]`.
fn filter_block(state: &mut KalmanState, indices: &[usize], residual: &Array1<f64>, measurement_cov: &Array2<f64>) -> f64 {
    let m = indices.len();
    let mut s = measurement_cov.clone();
    for (a, &ia) in indices.iter().enumerate() {
        for (b, &ib) in indices.iter().enumerate() {
            s[[a, b]] += state.c(ia, ib);
        }
    }

    let s_inv = match invert_small(&s) {
        Some(inv) => inv,
        None => return f64::INFINITY,
    };

    let n = tf_model::STATE_DIM;
    // gain[:, a] = C[:, indices[a]]
    let mut gain = Array2::zeros((n, m));
    for row in 0..n {
        for (a, &ia) in indices.iter().enumerate() {
            gain[[row, a]] = state.c(row, ia);
        }
    }
    let gain = gain.dot(&s_inv);

    let mut params = [state.x, state.y, state.tx, state.ty, state.qp, state.t, state.vi];
    let correction = gain.dot(residual);
    for row in 0..n {
        params[row] += correction[row];
    }
    state.x = params[0];
    state.y = params[1];
    state.tx = params[2];
    state.ty = params[3];
    state.qp = params[4];
    state.t = params[5];
    state.vi = params[6];

    // C -= gain * C[indices, :]
    for row_i in 0..n {
        for row_j in 0..n {
            let mut delta = 0.0;
            for (a, &ia) in indices.iter().enumerate() {
                delta += gain[[row_i, a]] * state.c(ia, row_j);
            }
            let updated = state.c(row_i, row_j) - delta;
            state.set_c(row_i, row_j, updated);
        }
    }

    let chi2_vec = s_inv.dot(residual);
    residual.dot(&chi2_vec)
}

/// Inverts a 1x1 or 2x2 matrix directly (the only sizes this crate's
/// measurement updates ever need), clamping a near-singular pivot to
/// `1e-12` rather than failing outright (§7 "Cholesky pivot below 1e-12 ->
/// clamp pivot; continue").
fn invert_small(m: &Array2<f64>) -> Option<Array2<f64>> {
    match m.shape() {
        [1, 1] => {
            let v = m[[0, 0]].max(1e-12);
            Some(Array2::from_shape_vec((1, 1), vec![1.0 / v]).unwrap())
        }
        [2, 2] => {
            let a = m[[0, 0]];
            let b = m[[0, 1]];
            let c = m[[1, 0]];
            let d = m[[1, 1]];
            let mut det = a * d - b * c;
            if det.abs() < 1e-12 {
                det = det.signum() * 1e-12;
                if det == 0.0 {
                    det = 1e-12;
                }
            }
            let inv_det = 1.0 / det;
            Some(Array2::from_shape_vec((2, 2), vec![d * inv_det, -b * inv_det, -c * inv_det, a * inv_det]).unwrap())
        }
        _ => None,
    }
}

const X_IDX: usize = 0;
const Y_IDX: usize = 1;
const T_IDX: usize = 5;

/// Filters a correlated `(x, y)` measurement into `state`; returns the
/// chi-square contribution (`chi2_xy` in the triplet constructor's
/// terminology).
pub fn filter_xy(state: &mut KalmanState, x: f64, y: f64, dx2: f64, dy2: f64, dxy: f64) -> f64 {
    let residual = Array1::from_vec(vec![x - state.x, y - state.y]);
    let cov = Array2::from_shape_vec((2, 2), vec![dx2, dxy, dxy, dy2]).unwrap();
    let chi2 = filter_block(state, &[X_IDX, Y_IDX], &residual, &cov);
    state.ndf += 2;
    chi2
}

/// Filters a time measurement into `state`; returns its chi-square
/// contribution, or `0.0` without touching `ndf_time` if the station has no
/// time information (§7 "Time information not available... suppress time
/// residual test").
pub fn filter_time(state: &mut KalmanState, t: f64, dt2: f64, has_time_info: bool) -> f64 {
    if !has_time_info {
        return 0.0;
    }
    let residual = Array1::from_vec(vec![t - state.t]);
    let cov = Array2::from_shape_vec((1, 1), vec![dt2]).unwrap();
    let chi2 = filter_block(state, &[T_IDX], &residual, &cov);
    state.ndf_time += 1;
    chi2
}

/// Chi-square of an `(x, y)` measurement against `state` without mutating
/// it, for gating candidates before committing to a filter call (§4.3
/// "compute chi2_xy and chi2_u; accept if both < doubletChi2Cut" -- this
/// model carries only Cartesian hit covariances, so the two cuts collapse
/// into one joint chi2 test here).
pub fn chi2_xy(state: &KalmanState, x: f64, y: f64, dx2: f64, dy2: f64, dxy: f64) -> f64 {
    let mut probe = state.clone();
    filter_xy(&mut probe, x, y, dx2, dy2, dxy)
}
