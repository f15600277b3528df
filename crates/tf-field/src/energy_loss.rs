//! Direction-dependent energy-loss correction (§4.6 step 2).
//!
//! The backward (last-hit to first-hit) and forward (first-hit to last-hit)
//! fit passes traverse the same material in opposite directions, so the
//! mean ionisation loss must flip sign: a backward pass gains back the
//! energy a forward-moving particle would have lost. A simplified
//! Bethe-Bloch mean-loss term (constant per unit radiation length, the same
//! simplification the triplet/extension stages use for multiple scattering)
//! is applied to `1/p` directly rather than to `p`, since `Qp = q/p` is the
//! state's fifth component.

use tf_model::KalmanState;

const QP_IDX: usize = 4;

/// Direction of travel through the region for sign purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward pass: first-hit to last-hit, particle loses energy.
    Forward,
    /// Backward pass: last-hit to first-hit, correction sign flips.
    Backward,
}

/// Mean ionisation loss per unit radiation length fraction, in GeV,
/// independent of momentum above the minimum-ionising plateau -- the same
/// order-of-magnitude constant the reference tracker's energy-loss
/// correction uses for a thin silicon/scintillator layer.
const MEAN_LOSS_PER_X0: f64 = 0.002;

/// Applies the mean ionisation-loss correction to `state.qp`, given the
/// traversed material's thickness in radiation lengths and the pass
/// direction. Leaves the covariance untouched; only the scattering kick
/// (see [`crate::scattering`]) contributes process noise here.
pub fn apply_energy_loss(state: &mut KalmanState, radiation_length_fraction: f64, direction: Direction) {
    if radiation_length_fraction <= 0.0 || state.qp == 0.0 {
        return;
    }
    let momentum = 1.0 / state.qp.abs();
    if !momentum.is_finite() || momentum <= 0.0 {
        return;
    }
    let delta_e = MEAN_LOSS_PER_X0 * radiation_length_fraction;
    let sign = match direction {
        Direction::Forward => -1.0,
        Direction::Backward => 1.0,
    };
    let new_momentum = (momentum + sign * delta_e).max(1e-3);
    state.qp = state.qp.signum() * (1.0 / new_momentum);
}
