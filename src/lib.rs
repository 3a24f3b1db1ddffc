// sysmon library - Public API

// Re-export error types
pub mod error;
pub use error::{MonitorError, Result};

// Module declarations
pub mod cli;
pub mod commands;
pub mod core;
pub mod ui;

// Re-export commonly used types
pub use core::config::MonitorConfig;
pub use core::monitor::MonitorSession;

/// Initialize logging at `level`; `RUST_LOG` takes precedence when set.
pub fn init_logging(level: log::LevelFilter) {
    let env = env_logger::Env::default().default_filter_or(level.as_str());
    let _ = env_logger::Builder::from_env(env).try_init();
}
