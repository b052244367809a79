//! File logging via tracing. The terminal is in raw mode, so nothing goes to stdout/stderr.

use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install a subscriber writing to `path`, filtered by `RUST_LOG` (default `info`).
/// Without a path, logging stays off.
pub fn init(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))?;
    tracing::info!(path = %path.display(), "logging started");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_path_is_noop() {
        assert!(init(None).is_ok());
    }

    #[test]
    fn test_unwritable_path_reports_context() {
        let err = init(Some(Path::new("/nonexistent-dir/tilestui.log"))).unwrap_err();
        assert!(err.to_string().contains("creating log file"));
    }
}
