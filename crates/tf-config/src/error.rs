//! Construction-time configuration errors (§10.2): the only fallible
//! surface this crate exposes. Once a [`crate::Parameters`] is built, the
//! pipeline never consults this type again.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParametersError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("station count {0} exceeds the maximum of {max}", max = tf_model::ids::MAX_STATIONS)]
    TooManyStations(usize),
    #[error("iteration {iteration} references station index {station}, outside [0, {active})")]
    IterationStationOutOfRange { iteration: usize, station: usize, active: usize },
    #[error("station {0} has non-finite z or non-positive bounds")]
    InvalidStation(usize, #[source] tf_model::StationError),
    #[error("station {0} field polynomial coefficient count does not match its declared order")]
    MalformedFieldPolynomial(usize),
}
