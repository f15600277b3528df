//! The core's single configuration surface (§6, §10.3).

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ParametersError;
use crate::iteration::Iteration;
use crate::station_spec::{StationBuildError, StationSpec};
use tf_model::ids::MAX_STATIONS;
use tf_model::Station;

/// Per-detector misalignment correction (§6: `misalignment{X,Y,T}[nDet]`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Misalignment {
    pub x: f32,
    pub y: f32,
    pub t: f32,
}

/// Primary-vertex region: position and measurement sigma (§4.3 "Kalman
/// update against the target position with the configured (sigma x, sigma
/// y)").
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Target {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
}

#[derive(Debug, Deserialize)]
struct ParametersFile {
    #[serde(default = "defaults::max_doublets_per_singlet")]
    max_doublets_per_singlet: u32,
    #[serde(default = "defaults::max_triplets_per_doublet")]
    max_triplets_per_doublet: u32,
    #[serde(default)]
    ghost_suppression: bool,
    #[serde(default = "defaults::default_mass")]
    default_mass: f32,
    #[serde(default)]
    random_seed: i32,
    #[serde(default)]
    dev_ignore_hit_search_areas: bool,
    #[serde(default)]
    dev_use_original_field: bool,
    #[serde(default)]
    dev_use_parametrised_search_window: bool,
    target: Target,
    #[serde(default)]
    misalignment: Vec<Misalignment>,
    stations: Vec<StationSpec>,
    iterations: Vec<Iteration>,
}

mod defaults {
    pub fn max_doublets_per_singlet() -> u32 {
        150
    }
    pub fn max_triplets_per_doublet() -> u32 {
        15
    }
    pub fn default_mass() -> f32 {
        tf_model::physics::MUON_MASS as f32
    }
}

/// Fully validated, ready-to-use configuration. Construction is the only
/// fallible surface in the crate (§10.2): once built, every field is
/// guaranteed internally consistent.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub max_doublets_per_singlet: u32,
    pub max_triplets_per_doublet: u32,
    pub ghost_suppression: bool,
    pub default_mass: f32,
    pub random_seed: i32,
    pub dev_ignore_hit_search_areas: bool,
    pub dev_use_original_field: bool,
    pub dev_use_parametrised_search_window: bool,
    pub target: Target,
    pub misalignment: Vec<Misalignment>,
    pub stations: Vec<Station>,
    pub iterations: Vec<Iteration>,
}

impl Parameters {
    /// Number of active (tracking-participating) stations.
    pub fn active_station_count(&self) -> usize {
        self.stations.len()
    }

    /// Loads and validates a configuration from a TOML file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParametersError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| ParametersError::Io { path: path.display().to_string(), source })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a configuration from an in-memory TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ParametersError> {
        let file: ParametersFile = toml::from_str(content)?;
        Self::from_file_repr(file)
    }

    fn from_file_repr(file: ParametersFile) -> Result<Self, ParametersError> {
        if file.stations.len() > MAX_STATIONS {
            return Err(ParametersError::TooManyStations(file.stations.len()));
        }

        let mut stations = Vec::with_capacity(file.stations.len());
        for (idx, spec) in file.stations.iter().enumerate() {
            let station = spec.build().map_err(|err| match err {
                StationBuildError::MalformedFieldPolynomial => ParametersError::MalformedFieldPolynomial(idx),
                StationBuildError::Invariant(inner) => ParametersError::InvalidStation(idx, inner),
            })?;
            stations.push(station);
        }

        for (i, iteration) in file.iterations.iter().enumerate() {
            let max_gap = iteration.max_station_gap as usize;
            if max_gap >= stations.len() && !stations.is_empty() {
                return Err(ParametersError::IterationStationOutOfRange {
                    iteration: i,
                    station: max_gap,
                    active: stations.len(),
                });
            }
        }

        tracing::debug!(
            target: "tf_config::parameters",
            n_stations = stations.len(),
            n_iterations = file.iterations.len(),
            "parameters loaded"
        );

        Ok(Self {
            max_doublets_per_singlet: file.max_doublets_per_singlet,
            max_triplets_per_doublet: file.max_triplets_per_doublet,
            ghost_suppression: file.ghost_suppression,
            default_mass: file.default_mass,
            random_seed: file.random_seed,
            dev_ignore_hit_search_areas: file.dev_ignore_hit_search_areas,
            dev_use_original_field: file.dev_use_original_field,
            dev_use_parametrised_search_window: file.dev_use_parametrised_search_window,
            target: file.target,
            misalignment: file.misalignment,
            stations,
            iterations: file.iterations,
        })
    }

    /// A small in-memory configuration (5 stations, no field, one primary
    /// iteration) usable without a TOML file on disk, for tests and the
    /// demo binary.
    pub fn default_cbm_like() -> Self {
        let stations = (0..5)
            .map(|i| Station {
                detector_id: i as u16,
                z: 10.0 + 20.0 * i as f64,
                field_present: false,
                time_info: true,
                x_max: 50.0,
                y_max: 50.0,
                field_slice: tf_model::FieldSlice::zero(),
            })
            .collect();
        Self {
            max_doublets_per_singlet: defaults::max_doublets_per_singlet(),
            max_triplets_per_doublet: defaults::max_triplets_per_doublet(),
            ghost_suppression: true,
            default_mass: defaults::default_mass(),
            random_seed: 0,
            dev_ignore_hit_search_areas: false,
            dev_use_original_field: false,
            dev_use_parametrised_search_window: false,
            target: Target { x: 0.0, y: 0.0, z: 0.0, sigma_x: 0.1, sigma_y: 0.1 },
            misalignment: Vec::new(),
            stations,
            iterations: vec![Iteration::default_primary()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cbm_like_is_self_consistent() {
        let params = Parameters::default_cbm_like();
        assert_eq!(params.active_station_count(), 5);
        assert_eq!(params.iterations.len(), 1);
    }

    #[test]
    fn parses_minimal_toml() {
        let toml_str = r#"
            [target]
            x = 0.0
            y = 0.0
            z = 0.0
            sigma_x = 0.1
            sigma_y = 0.1

            [[stations]]
            detector_id = 0
            z = 10.0
            x_max = 50.0
            y_max = 50.0

            [[stations]]
            detector_id = 1
            z = 30.0
            x_max = 50.0
            y_max = 50.0

            [[iterations]]
            doublet_chi2_cut = 12.0
            triplet_chi2_cut = 12.0
            triplet_final_chi2_cut = 10.0
            track_chi2_cut = 3.5
            triplet_link_chi2 = 10.0
            max_station_gap = 0
            min_nhits = 4
            min_nhits_station0 = 4
        "#;
        let params = Parameters::from_toml_str(toml_str).unwrap();
        assert_eq!(params.active_station_count(), 2);
        assert_eq!(params.max_doublets_per_singlet, 150);
    }

    #[test]
    fn rejects_iteration_with_too_large_station_gap() {
        let toml_str = r#"
            [target]
            x = 0.0
            y = 0.0
            z = 0.0
            sigma_x = 0.1
            sigma_y = 0.1

            [[stations]]
            detector_id = 0
            z = 10.0
            x_max = 50.0
            y_max = 50.0

            [[iterations]]
            doublet_chi2_cut = 12.0
            triplet_chi2_cut = 12.0
            triplet_final_chi2_cut = 10.0
            track_chi2_cut = 3.5
            triplet_link_chi2 = 10.0
            max_station_gap = 5
            min_nhits = 4
            min_nhits_station0 = 4
        "#;
        assert!(Parameters::from_toml_str(toml_str).is_err());
    }
}
