//! A field region: three `(z, FieldSlice)` samples the propagator
//! interpolates between (§9 "three distinct field regions").

use tf_model::{FieldSlice, Station};

/// Three field samples spanning a propagation segment. The samples are not
/// necessarily the region's own stations' planes — the target-to-left and
/// triplet-propagation regions both reuse this type with whichever three
/// planes bound the step.
#[derive(Debug, Clone)]
pub struct FieldRegion {
    z: [f64; 3],
    slice: [FieldSlice; 3],
}

impl FieldRegion {
    pub fn new(z0: f64, slice0: FieldSlice, z1: f64, slice1: FieldSlice, z2: f64, slice2: FieldSlice) -> Self {
        Self { z: [z0, z1, z2], slice: [slice0, slice1, slice2] }
    }

    /// Builds a region from three stations ordered by `z`, as used for
    /// triplet propagation `(sL, sM, sR)` and the final-fit per-station
    /// region.
    pub fn from_stations(a: &Station, b: &Station, c: &Station) -> Self {
        Self::new(a.z, a.field_slice.clone(), b.z, b.field_slice.clone(), c.z, c.field_slice.clone())
    }

    /// A degenerate all-zero region, used for the target-to-first-station
    /// step when no upstream station exists yet.
    pub fn zero(z: f64) -> Self {
        Self::new(z, FieldSlice::zero(), z, FieldSlice::zero(), z, FieldSlice::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.slice.iter().all(FieldSlice::is_zero)
    }

    /// Evaluates `(Bx, By, Bz)` at `(x, y, z)` by evaluating each sample's
    /// polynomial at `(x, y)` and quadratically (Lagrange) interpolating the
    /// three resulting values in `z`. Coefficients always come from the
    /// station parameter block, never recomputed from raw field maps.
    pub fn eval(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (bx0, by0, bz0) = self.slice[0].eval(x, y);
        let (bx1, by1, bz1) = self.slice[1].eval(x, y);
        let (bx2, by2, bz2) = self.slice[2].eval(x, y);

        let w = lagrange_weights(self.z, z);
        (
            w[0] * bx0 + w[1] * bx1 + w[2] * bx2,
            w[0] * by0 + w[1] * by1 + w[2] * by2,
            w[0] * bz0 + w[1] * bz1 + w[2] * bz2,
        )
    }
}

/// Quadratic Lagrange basis weights for nodes `z` evaluated at `at`. Falls
/// back gracefully (weight 1 on the coincident node) when two nodes
/// coincide, which happens at the region boundaries of a 3-station window.
fn lagrange_weights(z: [f64; 3], at: f64) -> [f64; 3] {
    let mut w = [0.0; 3];
    for i in 0..3 {
        let mut term = 1.0;
        let mut denom = 1.0;
        for (j, &zj) in z.iter().enumerate() {
            if i == j {
                continue;
            }
            if (z[i] - zj).abs() < 1e-9 {
                // Degenerate node spacing: skip this basis entirely and let
                // the remaining loop pick up the coincident sample directly.
                continue;
            }
            term *= at - zj;
            denom *= z[i] - zj;
        }
        w[i] = if denom != 0.0 { term / denom } else { 0.0 };
    }
    let sum: f64 = w.iter().sum();
    if sum.abs() > 1e-9 {
        for wi in &mut w {
            *wi /= sum;
        }
    } else {
        w = [1.0, 0.0, 0.0];
    }
    w
}
