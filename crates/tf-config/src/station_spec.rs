//! TOML-deserializable station description, converted into [`tf_model::Station`].

use serde::Deserialize;
use tf_model::{FieldPolynomial, FieldSlice, Station, StationError};

#[derive(Debug, Clone, Deserialize)]
pub struct FieldPolynomialSpec {
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub coefficients: Vec<f64>,
}

impl FieldPolynomialSpec {
    fn build(&self) -> Option<FieldPolynomial> {
        if self.coefficients.is_empty() {
            return Some(FieldPolynomial::zero());
        }
        FieldPolynomial::new(self.order, self.coefficients.clone())
    }
}

impl Default for FieldPolynomialSpec {
    fn default() -> Self {
        Self { order: 0, coefficients: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct FieldSliceSpec {
    #[serde(default)]
    pub bx: FieldPolynomialSpec,
    #[serde(default)]
    pub by: FieldPolynomialSpec,
    #[serde(default)]
    pub bz: FieldPolynomialSpec,
}

impl FieldSliceSpec {
    fn build(&self) -> Option<FieldSlice> {
        Some(FieldSlice { bx: self.bx.build()?, by: self.by.build()?, bz: self.bz.build()? })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationSpec {
    pub detector_id: u16,
    pub z: f64,
    #[serde(default)]
    pub field_present: bool,
    #[serde(default)]
    pub time_info: bool,
    pub x_max: f64,
    pub y_max: f64,
    #[serde(default)]
    pub field_slice: FieldSliceSpec,
}

impl StationSpec {
    /// Builds and validates a [`Station`], returning `None` only when the
    /// configured field-polynomial coefficient count doesn't match its
    /// declared order (a malformed spec, caught before `check_consistency`
    /// is even reached).
    pub fn build(&self) -> Result<Station, StationBuildError> {
        let field_slice = self.field_slice.build().ok_or(StationBuildError::MalformedFieldPolynomial)?;
        let station = Station {
            detector_id: self.detector_id,
            z: self.z,
            field_present: self.field_present,
            time_info: self.time_info,
            x_max: self.x_max,
            y_max: self.y_max,
            field_slice,
        };
        station.check_consistency().map_err(StationBuildError::Invariant)?;
        Ok(station)
    }
}

#[derive(Debug)]
pub enum StationBuildError {
    MalformedFieldPolynomial,
    Invariant(StationError),
}
