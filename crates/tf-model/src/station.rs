//! Station geometry and magnetic-field-slice descriptors (§3).

use thiserror::Error;

/// Maximum supported order of the 2-D polynomial used to approximate
/// `(Bx, By, Bz)` near a station plane. The reference implementation caps
/// this at 5; we keep the same cap so the triangular coefficient count stays
/// bounded.
pub const MAX_FIELD_APPROX_ORDER: usize = 5;

/// Number of coefficients in a triangular 2-D polynomial of the given order,
/// i.e. the count of monomials `x^i * y^j` with `i + j <= order`.
pub const fn field_approx_coefficient_count(order: usize) -> usize {
    (order + 1) * (order + 2) / 2
}

/// A triangular polynomial approximation of one magnetic field component
/// over a station's `(x, y)` plane, built once by the geometry/parameter
/// builder and never recomputed at runtime (see design notes, field
/// regions).
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPolynomial {
    order: usize,
    /// Coefficients in triangular order: index `k` for monomial `x^i y^j`
    /// where `i + j` increases with `k` and, within an equal total degree,
    /// `i` decreases.
    coefficients: Vec<f64>,
}

impl FieldPolynomial {
    /// Builds a polynomial of the given `order` from a coefficient slice.
    ///
    /// Returns `None` if `order` exceeds [`MAX_FIELD_APPROX_ORDER`] or the
    /// slice length does not match [`field_approx_coefficient_count`].
    pub fn new(order: usize, coefficients: Vec<f64>) -> Option<Self> {
        if order > MAX_FIELD_APPROX_ORDER || coefficients.len() != field_approx_coefficient_count(order) {
            return None;
        }
        Some(Self { order, coefficients })
    }

    /// A zero field, used for regions / stations with no magnetic field.
    pub fn zero() -> Self {
        Self { order: 0, coefficients: vec![0.0] }
    }

    /// Evaluates the polynomial at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let mut value = 0.0;
        let mut k = 0;
        for total_degree in 0..=self.order {
            for i in (0..=total_degree).rev() {
                let j = total_degree - i;
                value += self.coefficients[k] * x.powi(i as i32) * y.powi(j as i32);
                k += 1;
            }
        }
        value
    }
}

/// Three independent polynomial approximations, one per field component.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlice {
    pub bx: FieldPolynomial,
    pub by: FieldPolynomial,
    pub bz: FieldPolynomial,
}

impl FieldSlice {
    pub fn zero() -> Self {
        Self {
            bx: FieldPolynomial::zero(),
            by: FieldPolynomial::zero(),
            bz: FieldPolynomial::zero(),
        }
    }

    /// Evaluates `(Bx, By, Bz)` at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> (f64, f64, f64) {
        (self.bx.eval(x, y), self.by.eval(x, y), self.bz.eval(x, y))
    }

    pub fn is_zero(&self) -> bool {
        self.bx.coefficients.iter().all(|c| *c == 0.0)
            && self.by.coefficients.iter().all(|c| *c == 0.0)
            && self.bz.coefficients.iter().all(|c| *c == 0.0)
    }
}

/// One tracking-detector layer. Stations are ordered by `z`; indices
/// `0..active_station_count` participate in tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub detector_id: u16,
    pub z: f64,
    pub field_present: bool,
    pub time_info: bool,
    pub x_max: f64,
    pub y_max: f64,
    pub field_slice: FieldSlice,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StationError {
    #[error("station x_max/y_max must be finite and positive, got ({0}, {1})")]
    InvalidBounds(String, String),
    #[error("station z must be finite, got {0}")]
    NonFiniteZ(String),
}

impl Station {
    /// Verifies the invariants a station must satisfy once fully built,
    /// mirroring the reference implementation's `Station::CheckConsistency`
    /// (construction-time check, not a per-event one; see §10.2).
    pub fn check_consistency(&self) -> Result<(), StationError> {
        if !self.z.is_finite() {
            return Err(StationError::NonFiniteZ(format!("{:?}", self.z)));
        }
        if !(self.x_max.is_finite() && self.y_max.is_finite() && self.x_max > 0.0 && self.y_max > 0.0) {
            return Err(StationError::InvalidBounds(
                format!("{:?}", self.x_max),
                format!("{:?}", self.y_max),
            ));
        }
        Ok(())
    }

    /// Whether `(x, y)` falls within the station's active bounding box.
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x.abs() <= self.x_max && y.abs() <= self.y_max
    }
}
