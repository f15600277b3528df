//! Single configuration surface for the track finder (§6, §10.3).

mod error;
mod iteration;
mod parameters;
mod station_spec;

pub use error::ParametersError;
pub use iteration::Iteration;
pub use parameters::{Misalignment, Parameters, Target};
pub use station_spec::{FieldPolynomialSpec, FieldSliceSpec, StationSpec};
