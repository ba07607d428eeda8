//! Extrinsics files: one raw 4x4 row-major little-endian `f64` matrix per
//! sensor pair, named `{source}-{destination}.bin` and stored in the
//! extrinsics directory of the source sensor.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use tracing::{info, warn};

use crate::{
    calibration::{ExtrinsicsGraph, SensorPair},
    error::{Error, Result},
    platform::Platform,
    transform::Transform,
};

/// Size of an extrinsics file.
pub const MATRIX_FILE_SIZE: usize = 16 * std::mem::size_of::<f64>();

const MATRIX_FILE_EXTENSION: &str = "bin";

/// `{source}-{destination}.bin`
pub fn matrix_file_name(pair: &SensorPair) -> String {
    format!("{pair}.{MATRIX_FILE_EXTENSION}")
}

/// Serializes the matrix row by row.
pub fn encode_matrix(matrix: &Matrix4<f64>) -> [u8; MATRIX_FILE_SIZE] {
    let mut bytes = [0u8; MATRIX_FILE_SIZE];
    for (chunk, value) in bytes
        .chunks_exact_mut(8)
        .zip(matrix.transpose().iter())
    {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_matrix(bytes: &[u8]) -> Result<Matrix4<f64>> {
    if bytes.len() != MATRIX_FILE_SIZE {
        return Err(Error::Parser(format!(
            "extrinsics should have {MATRIX_FILE_SIZE} bytes, found {}",
            bytes.len()
        )));
    }

    let mut values = [0.0; 16];
    for (value, chunk) in values.iter_mut().zip(bytes.chunks_exact(8)) {
        let mut le_bytes = [0u8; 8];
        le_bytes.copy_from_slice(chunk);
        *value = f64::from_le_bytes(le_bytes);
    }
    Ok(Matrix4::from_row_slice(&values))
}

/// Reads an extrinsics file.
pub fn read_matrix<P: AsRef<Path>>(path: P) -> Result<Transform> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|err| Error::persistence(path, err))?;
    Transform::from_matrix4(&decode_matrix(&bytes)?)
}

/// Writes an extrinsics file. The bytes go to a temporary file first that is
/// then renamed over `path`.
pub fn write_matrix<P: AsRef<Path>>(path: P, transform: &Transform) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = path.with_extension(format!("{MATRIX_FILE_EXTENSION}.tmp"));
    std::fs::write(&tmp_path, encode_matrix(transform.matrix()))
        .map_err(|err| Error::persistence(&tmp_path, err))?;
    std::fs::rename(&tmp_path, path).map_err(|err| Error::persistence(path, err))
}

/// Outcome of saving a graph. A failed pair doesn't stop the others.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// Written files.
    pub saved: Vec<PathBuf>,
    /// Previous versions moved into the `old_{timestamp}` directories.
    pub backups: Vec<PathBuf>,
    pub failures: Vec<(SensorPair, Error)>,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Moves `path` into `old_{timestamp}/` next to it.
fn backup_file(path: &Path, timestamp: u64) -> Result<PathBuf> {
    let (dir, file_name) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(file_name)) => (dir, file_name),
        _ => return Err(Error::invalid_parameter(format!("{path:?} is not a file"))),
    };

    let backup_dir = dir.join(format!("old_{timestamp}"));
    std::fs::create_dir_all(&backup_dir).map_err(|err| Error::persistence(&backup_dir, err))?;
    let backup_path = backup_dir.join(file_name);
    std::fs::rename(path, &backup_path).map_err(|err| Error::persistence(path, err))?;
    Ok(backup_path)
}

fn save_pair(
    dir: &Path,
    pair: &SensorPair,
    transform: &Transform,
    timestamp: u64,
    report: &mut SaveReport,
) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|err| Error::persistence(dir, err))?;

    let path = dir.join(matrix_file_name(pair));
    if path.exists() {
        report.backups.push(backup_file(&path, timestamp)?);
    }
    write_matrix(&path, transform)?;
    report.saved.push(path);
    Ok(())
}

/// Writes every entry of the graph into the extrinsics directory of its
/// source sensor, backing up the existing files into `old_{timestamp}/`.
/// Sensors without an extrinsics directory are skipped.
pub fn save_graph<P>(graph: &ExtrinsicsGraph, platform: &P, timestamp: u64) -> SaveReport
where
    P: Platform + ?Sized,
{
    let mut report = SaveReport::default();
    for (pair, transform) in graph.iter() {
        let dir = match platform.extrinsics_dir(&pair.source) {
            Some(dir) => dir,
            None => {
                warn!(sensor = pair.source.as_str(), "No extrinsics directory, not saving {pair}");
                continue;
            }
        };

        if let Err(err) = save_pair(&dir, pair, transform, timestamp, &mut report) {
            warn!("Failed to save {pair}: {err}");
            report.failures.push((pair.clone(), err));
        }
    }

    info!(
        saved = report.saved.len(),
        backups = report.backups.len(),
        failures = report.failures.len(),
        "Saved extrinsics"
    );
    report
}

/// Splits a `{source}-{destination}` file stem into two known sensor names.
/// Sensor names may contain `-` themselves.
fn parse_pair(stem: &str, sensors: &BTreeSet<String>) -> Option<SensorPair> {
    stem.match_indices('-').find_map(|(pos, _)| {
        let (source, destination) = (&stem[..pos], &stem[pos + 1..]);
        (sensors.contains(source) && sensors.contains(destination))
            .then(|| SensorPair::new(source, destination))
    })
}

/// Loads every `{source}-{destination}.bin` file between known sensors from
/// the extrinsics directories of the platform.
///
/// When both directions are on disk, the pair whose source comes first
/// (lexicographically) is kept and the other direction is its inverse.
pub fn load_graph<P>(platform: &P) -> Result<ExtrinsicsGraph>
where
    P: Platform + ?Sized,
{
    let sensors: BTreeSet<String> = platform.sensors().into_iter().collect();
    let dirs: BTreeSet<PathBuf> = sensors
        .iter()
        .filter_map(|sensor| platform.extrinsics_dir(sensor))
        .filter(|dir| dir.is_dir())
        .collect();

    let mut entries = Vec::new();
    for dir in dirs {
        let pattern = format!(
            "{}/*.{MATRIX_FILE_EXTENSION}",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        for path in glob::glob(&pattern)? {
            let path = path?;
            let pair = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| parse_pair(stem, &sensors));
            match pair {
                Some(pair) => entries.push((pair, path)),
                None => warn!("Ignoring {path:?}, not named after two known sensors"),
            }
        }
    }
    entries.sort();

    let mut graph = ExtrinsicsGraph::new();
    for (pair, path) in entries {
        let transform = read_matrix(&path)?;
        if let Some(existing) = graph.get(&pair.source, &pair.destination) {
            if !approx::abs_diff_eq!(existing, &transform, epsilon = 1e-6) {
                warn!("{path:?} disagrees with the inverse of {}", pair.reversed());
            }
            continue;
        }
        graph.update(&pair.source, &pair.destination, &transform)?;
    }

    info!(entries = graph.len(), "Loaded extrinsics");
    Ok(graph)
}
