mod config;
pub use config::{PlatformConfig, SensorConfig};
mod manifest;
pub use manifest::{FrameEntry, FrameManifest, MANIFEST_FILE};
mod ply;
pub use ply::{read_ply, write_ply};
