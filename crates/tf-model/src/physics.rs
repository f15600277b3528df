//! Physical constants used by the fitter and seed builder.
//!
//! Values are carried over from the reference CA tracker's compile-time
//! constants (particle masses, speed of light in cm/ns) rather than
//! recomputed, matching the "do not recompute from raw fields at runtime"
//! stance the rest of the field model takes.

/// Muon mass, GeV/c^2. Default particle hypothesis for the fitter.
pub const MUON_MASS: f64 = 0.105_658_375_523;
/// Pion mass, GeV/c^2.
pub const PION_MASS: f64 = 0.139_570_391_8;
/// Kaon mass, GeV/c^2.
pub const KAON_MASS: f64 = 0.493_677;
/// Electron mass, GeV/c^2.
pub const ELECTRON_MASS: f64 = 0.000_510_998_950_001_5;
/// Proton mass, GeV/c^2.
pub const PROTON_MASS: f64 = 0.938_272_088_16;
/// Speed of light, cm/ns.
pub const SPEED_OF_LIGHT: f64 = 29.979_245_8;
/// Inverse speed of light, ns/cm.
pub const SPEED_OF_LIGHT_INV: f64 = 1.0 / SPEED_OF_LIGHT;
