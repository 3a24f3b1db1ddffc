// UI and formatting module

pub mod dashboard;
pub mod formatters;
pub mod report;

// Re-export commonly used items for cleaner imports
pub use dashboard::{render_dashboard, DashboardFrame};
pub use formatters::{
    format_bps, format_byte_rate, format_bytes, format_size, format_time, format_timestamp,
    format_uptime, usage_bar,
};
pub use report::{
    print_connectivity, print_host_info, print_interfaces, print_speed_test_outcome,
    print_speed_test_result,
};
