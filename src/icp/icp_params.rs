use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Error metric minimized at each ICP iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IcpMode {
    /// Squared distance between matched points.
    #[default]
    Point,
    /// Distance from the source point to the plane of the matched destination point.
    Plane,
}

impl std::str::FromStr for IcpMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "point" => Ok(IcpMode::Point),
            "plane" => Ok(IcpMode::Plane),
            other => Err(Error::invalid_parameter(format!(
                "unknown ICP mode {other:?}, expected point or plane"
            ))),
        }
    }
}

/// Parameters of the ICP algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IcpParams {
    /// Source points farther than this from every destination point, in meters,
    /// are left out of an iteration.
    pub max_correspondence_distance: f64,
    pub mode: IcpMode,
    pub max_iterations: usize,
    /// The algorithm stops when an iteration update moves less than this, both
    /// in radians and in meters.
    pub convergence_epsilon: f64,
    /// Neighbors used to estimate destination normals in plane mode.
    pub normal_neighbors: usize,
}

impl Default for IcpParams {
    fn default() -> Self {
        Self {
            max_correspondence_distance: 0.5,
            mode: IcpMode::Point,
            max_iterations: 30,
            convergence_epsilon: 1e-9,
            normal_neighbors: 10,
        }
    }
}

impl IcpParams {
    pub fn max_correspondence_distance(&'_ mut self, value: f64) -> &'_ mut IcpParams {
        self.max_correspondence_distance = value;
        self
    }

    pub fn mode(&'_ mut self, value: IcpMode) -> &'_ mut IcpParams {
        self.mode = value;
        self
    }

    pub fn max_iterations(&'_ mut self, value: usize) -> &'_ mut IcpParams {
        self.max_iterations = value;
        self
    }

    pub fn convergence_epsilon(&'_ mut self, value: f64) -> &'_ mut IcpParams {
        self.convergence_epsilon = value;
        self
    }

    /// Checks that the values are usable.
    pub fn validate(&self) -> Result<()> {
        let max_distance = self.max_correspondence_distance;
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(Error::invalid_parameter(format!(
                "max_correspondence_distance should be positive, found {max_distance}"
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::invalid_parameter("max_iterations should be positive"));
        }
        if self.convergence_epsilon.is_nan() || self.convergence_epsilon < 0.0 {
            return Err(Error::invalid_parameter(
                "convergence_epsilon should be non negative",
            ));
        }
        if self.mode == IcpMode::Plane && self.normal_neighbors < 3 {
            return Err(Error::invalid_parameter(
                "normal_neighbors should be at least 3",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_validate() {
        assert!(IcpParams::default().validate().is_ok());
        assert!(IcpParams::default()
            .max_correspondence_distance(0.0)
            .validate()
            .is_err());
        assert!(IcpParams::default()
            .max_correspondence_distance(f64::NAN)
            .validate()
            .is_err());
        assert!(IcpParams::default().max_iterations(0).validate().is_err());
    }

    #[test]
    fn should_deserialize_with_defaults() {
        let params: IcpParams =
            serde_json::from_str(r#"{"mode": "plane", "max_iterations": 5}"#).unwrap();
        assert_eq!(params.mode, IcpMode::Plane);
        assert_eq!(params.max_iterations, 5);
        assert_eq!(params.max_correspondence_distance, 0.5);
    }

    #[test]
    fn should_parse_mode() {
        assert_eq!("Plane".parse::<IcpMode>().unwrap(), IcpMode::Plane);
        assert_eq!("point".parse::<IcpMode>().unwrap(), IcpMode::Point);
        assert!("line".parse::<IcpMode>().is_err());
    }
}
