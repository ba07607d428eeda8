use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;

/// File name of the manifest inside a frame directory.
pub const MANIFEST_FILE: &str = "frames.json";

/// One point cloud capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEntry {
    /// Capture time, in microseconds.
    pub timestamp: u64,
    /// PLY file, relative to the frame directory.
    pub file: PathBuf,
}

/// List of the frames of a point cloud directory:
///
/// ```json
/// {"frames": [{"timestamp": 1000, "file": "000000.ply"}]}
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameManifest {
    pub frames: Vec<FrameEntry>,
}

impl FrameManifest {
    /// Loads `frames.json` from `base_dir`. Frames are sorted by timestamp.
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let buffer = std::io::BufReader::new(std::fs::File::open(
            base_dir.as_ref().join(MANIFEST_FILE),
        )?);
        let mut manifest: FrameManifest = serde_json::from_reader(buffer)?;
        manifest.frames.sort_by_key(|entry| entry.timestamp);
        Ok(manifest)
    }

    /// Writes `frames.json` into `base_dir`.
    pub fn save<P: AsRef<Path>>(&self, base_dir: P) -> Result<()> {
        let buffer = std::io::BufWriter::new(std::fs::File::create(
            base_dir.as_ref().join(MANIFEST_FILE),
        )?);
        serde_json::to_writer_pretty(buffer, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn timestamps(&self) -> Vec<u64> {
        self.frames.iter().map(|entry| entry.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn should_load_sorted_frames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{"frames": [
                {"timestamp": 2000, "file": "b.ply"},
                {"timestamp": 1000, "file": "a.ply"}
            ]}"#,
        )
        .unwrap();

        let manifest = FrameManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.timestamps(), vec![1000, 2000]);
        assert_eq!(manifest.frames[0].file, PathBuf::from("a.ply"));

        manifest.save(dir.path()).unwrap();
        assert_eq!(FrameManifest::load(dir.path()).unwrap(), manifest);
    }

    #[test]
    fn should_report_bad_manifests() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            FrameManifest::load(dir.path()),
            Err(Error::Io(_))
        ));

        std::fs::write(dir.path().join(MANIFEST_FILE), "{\"frames\": 3}").unwrap();
        assert!(matches!(
            FrameManifest::load(dir.path()),
            Err(Error::Parser(_))
        ));
    }
}
