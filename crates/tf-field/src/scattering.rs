//! Multiple-scattering process noise (§4.3 step 5, §4.6 step 2).
//!
//! Uses the standard Highland thick-scatterer approximation: a single
//! Gaussian kick in `(Tx, Ty)` whose variance depends on the material
//! thickness in radiation lengths and the track momentum, added to the
//! covariance's `(Tx,Tx)`, `(Ty,Ty)` and `(Tx,Ty)` entries (and their
//! correlated pull into `x`, `y` over the remaining path, handled by the
//! caller's subsequent propagation step rather than here).

use tf_model::KalmanState;

const TX_IDX: usize = 2;
const TY_IDX: usize = 3;

/// Adds Highland multiple-scattering variance to the slope block of
/// `state`'s covariance, given the traversed material's thickness in units
/// of radiation length (`x / X0`) and the particle's estimated momentum.
///
/// `theta0^2 = (13.6 MeV / (beta*c*p))^2 * (x/X0) * [1 + 0.038 ln(x/X0)]^2`
/// projected onto `(Tx, Ty)` assuming a thin, roughly normal-incidence
/// scatterer (the standard tracking-code simplification: the angular kick
/// splits evenly between the two slope directions).
pub fn apply_multiple_scattering(state: &mut KalmanState, radiation_length_fraction: f64, momentum_gev: f64) {
    if radiation_length_fraction <= 0.0 || !momentum_gev.is_finite() || momentum_gev <= 0.0 {
        return;
    }
    let mass = tf_model::physics::MUON_MASS;
    let energy = (momentum_gev * momentum_gev + mass * mass).sqrt();
    let beta = momentum_gev / energy;
    let beta_p = beta * momentum_gev;

    const HIGHLAND_COEFFICIENT: f64 = 0.0136; // GeV, Highland's formula constant
    let log_term = 1.0 + 0.038 * radiation_length_fraction.ln();
    let theta0 = (HIGHLAND_COEFFICIENT / beta_p) * radiation_length_fraction.sqrt() * log_term.max(0.0);
    let var = theta0 * theta0;

    let norm = (1.0 + state.tx * state.tx + state.ty * state.ty).sqrt();
    let cov_tx_tx = var * (1.0 + state.tx * state.tx) * norm;
    let cov_ty_ty = var * (1.0 + state.ty * state.ty) * norm;
    let cov_tx_ty = var * state.tx * state.ty * norm;

    let c_txtx = state.c(TX_IDX, TX_IDX) + cov_tx_tx;
    let c_tyty = state.c(TY_IDX, TY_IDX) + cov_ty_ty;
    let c_txty = state.c(TX_IDX, TY_IDX) + cov_tx_ty;
    state.set_c(TX_IDX, TX_IDX, c_txtx);
    state.set_c(TY_IDX, TY_IDX, c_tyty);
    state.set_c(TX_IDX, TY_IDX, c_txty);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_thickness_leaves_state_untouched() {
        let mut state = KalmanState::loose(0.0);
        let before = state.clone();
        apply_multiple_scattering(&mut state, 0.0, 1.0);
        assert_eq!(state, before);
    }

    #[test]
    fn thicker_material_increases_slope_variance() {
        let mut thin = KalmanState::loose(0.0);
        let mut thick = KalmanState::loose(0.0);
        apply_multiple_scattering(&mut thin, 0.001, 1.0);
        apply_multiple_scattering(&mut thick, 0.05, 1.0);
        assert!(thick.c(TX_IDX, TX_IDX) > thin.c(TX_IDX, TX_IDX));
    }

    #[test]
    fn lower_momentum_scatters_more() {
        let mut high_p = KalmanState::loose(0.0);
        let mut low_p = KalmanState::loose(0.0);
        apply_multiple_scattering(&mut high_p, 0.01, 5.0);
        apply_multiple_scattering(&mut low_p, 0.01, 0.3);
        assert!(low_p.c(TX_IDX, TX_IDX) > high_p.c(TX_IDX, TX_IDX));
    }
}
