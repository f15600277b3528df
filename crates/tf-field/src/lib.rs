//! Magnetic field region interpolation, multiple scattering and energy-loss
//! corrections shared by the seed builder, extender and fitter (§4.3, §4.6,
//! §9).

mod energy_loss;
mod filter;
mod propagate;
mod region;
mod scattering;

pub use energy_loss::{apply_energy_loss, Direction};
pub use filter::{chi2_xy, filter_time, filter_xy};
pub use propagate::extrapolate;
pub use region::FieldRegion;
pub use scattering::apply_multiple_scattering;
