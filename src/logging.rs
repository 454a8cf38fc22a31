use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber: human-readable output on stderr, filtered
/// by `RUST_LOG` (default `info`), and optionally the same events appended to
/// `log_file` without colours.
pub(crate) fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path).or_raise(|| ErrorKind::Logging)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        },
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}
