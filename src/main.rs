//! exserver: a minimal single-process web server
//!
//! Every client gets exactly one response: a fixed HTTP header block
//! followed by the contents of a static file, then the connection closes.
//!
//! Features:
//! - Readiness-based event loop (epoll/kqueue via mio)
//! - Optional extra event loops sharing one listening socket
//! - Configuration via CLI arguments or TOML file

mod config;
mod error;
mod http;
mod listener;
mod resource;
mod runtime;

use config::Config;
use resource::{Resource, StaticFile};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let workers = config.event_loops();
    let page = StaticFile::new(&config.resource);
    info!(
        port = %config.port,
        threads = workers,
        resource = %page.path().display(),
        "eXServer starting..."
    );

    let listener = listener::bind(&config.port)?;
    let resource: Arc<dyn Resource> = Arc::new(page);

    runtime::run(listener, resource, workers)?;
    Ok(())
}
