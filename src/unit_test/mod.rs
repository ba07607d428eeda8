mod point_clouds;
pub(crate) use point_clouds::{corner_cloud, plane_grid, sample_corner_cloud};
mod platforms;
pub(crate) use platforms::{sample_platform, SamplePlatform};
