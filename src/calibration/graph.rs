use std::collections::BTreeMap;

use itertools::Itertools;
use tracing::warn;

use super::SensorPair;
use crate::error::{Error, Result};
use crate::transform::Transform;

/// Extrinsics between sensors, kept symmetric: every `source -> destination`
/// entry has its `destination -> source` entry holding the inverse matrix.
#[derive(Clone, Debug, Default)]
pub struct ExtrinsicsGraph {
    edges: BTreeMap<SensorPair, Transform>,
}

impl ExtrinsicsGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform mapping `source` points into the `destination` frame.
    pub fn get(&self, source: &str, destination: &str) -> Option<&Transform> {
        self.edges.get(&SensorPair::new(source, destination))
    }

    /// Whether there are extrinsics between the two sensors.
    pub fn contains(&self, source: &str, destination: &str) -> bool {
        self.edges.contains_key(&SensorPair::new(source, destination))
    }

    /// Sets the `source -> destination` extrinsics and its inverse.
    ///
    /// A drifted rotation is orthonormalized before storing it. The graph is
    /// left untouched when this fails.
    ///
    /// # Returns
    ///
    /// `InvalidParameter` if both sensors are the same or if the matrix is singular.
    pub fn update(&mut self, source: &str, destination: &str, transform: &Transform) -> Result<()> {
        if source == destination {
            return Err(Error::invalid_parameter(format!(
                "extrinsics from {source} to itself are always the identity"
            )));
        }

        let not_invertible = || {
            Error::invalid_parameter(format!(
                "extrinsics {source}-{destination} are not invertible"
            ))
        };
        if transform.is_degenerate() {
            return Err(not_invertible());
        }

        let transform = if transform.has_drift() {
            warn!(source, destination, "Orthonormalizing drifted extrinsics");
            transform.orthonormalized()
        } else {
            transform.clone()
        };

        let inverse = transform.try_inverse().ok_or_else(not_invertible)?;

        let pair = SensorPair::new(source, destination);
        self.edges.insert(pair.reversed(), inverse);
        self.edges.insert(pair, transform);
        Ok(())
    }

    /// Sensors with at least one extrinsics target, sorted.
    pub fn sources(&self) -> Vec<String> {
        self.edges
            .keys()
            .map(|pair| pair.source.clone())
            .dedup()
            .collect()
    }

    /// Extrinsics targets of `source`, sorted.
    pub fn destinations(&self, source: &str) -> Vec<String> {
        self.edges
            .keys()
            .filter(|pair| pair.source == source && pair.destination != source)
            .map(|pair| pair.destination.clone())
            .collect()
    }

    /// Iterates over every direction of every entry, sorted by pair.
    pub fn iter(&self) -> impl Iterator<Item = (&SensorPair, &Transform)> + '_ {
        self.edges.iter()
    }

    /// Number of directed entries.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
