// Core business logic module

pub mod config;
pub mod host;
pub mod monitor;

// Re-export commonly used items
pub use config::MonitorConfig;
pub use host::{collect_host_info, collect_interfaces, HostInfo, NetworkInterface};
pub use monitor::MonitorSession;
