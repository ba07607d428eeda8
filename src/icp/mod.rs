mod icp_params;
pub use icp_params::{IcpMode, IcpParams};
mod cost_function;
mod pcl_icp;
pub use pcl_icp::{register, Icp, IcpResult};
