// Command handlers module
pub mod completions;
pub mod config;
pub mod connectivity;
pub mod info;
pub mod monitor;
pub mod speedtest;

use anyhow::{Context, Result};
use tokio::runtime::Runtime;

use crate::core::monitor::CancelToken;

/// Runtime for the async commands: a small multi-threaded pool, since sampling
/// work goes to the blocking pool anyway.
pub fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("sysmon-worker")
        .build()
        .context("Failed to start async runtime")
}

/// Cancel token tripped by Ctrl+C.
pub fn ctrlc_token() -> Result<CancelToken> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();

    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    Ok(cancel)
}
