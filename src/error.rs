use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the library.
#[derive(Debug, Error)]
pub enum Error {
    /// One of the point sets given to the registration is empty, or too
    /// small to constrain a rigid transform.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),
    /// No source point found a destination point within the correspondence distance.
    #[error("No overlap between point clouds within {max_distance} m (iteration {iteration})")]
    NoOverlap { max_distance: f64, iteration: usize },
    /// Every frame of a batch refinement failed.
    #[error("Calibration failed: none of the {frames} frames could be registered")]
    CalibrationFailed { frames: usize },
    /// The sensors have no point cloud datasource or no extrinsics between them.
    #[error("Undefined extrinsics path: {source_sensor} -> {destination_sensor}: {reason}")]
    MissingSensorPath {
        source_sensor: String,
        destination_sensor: String,
        reason: String,
    },
    /// Backing up or writing a calibration file failed.
    #[error("Persistence error on {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Used when the user pass a logical invalid parameter to a function.
    #[error("Parameter error: {0}")]
    InvalidParameter(String),
    /// A batch refinement was stopped through its cancel token.
    #[error("Calibration cancelled after {processed} frames")]
    Cancelled { processed: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parser error: {0}")]
    Parser(String),
}

impl Error {
    /// Create a error with the kind `InvalidParameter`.
    /// # Arguments
    /// * `msg` - The error message.
    pub fn invalid_parameter<T: ToString>(msg: T) -> Self {
        Error::InvalidParameter(msg.to_string())
    }

    pub fn insufficient_data<T: ToString>(msg: T) -> Self {
        Error::InsufficientData(msg.to_string())
    }

    pub fn missing_sensor_path<T: ToString>(source: &str, destination: &str, reason: T) -> Self {
        Error::MissingSensorPath {
            source_sensor: source.to_string(),
            destination_sensor: destination.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parser(err.to_string())
    }
}

impl From<glob::PatternError> for Error {
    fn from(err: glob::PatternError) -> Self {
        Error::Parser(err.to_string())
    }
}

impl From<glob::GlobError> for Error {
    fn from(err: glob::GlobError) -> Self {
        Error::Io(err.into_error())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
