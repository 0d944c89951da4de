use std::path::Path;
use std::sync::Once;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "keysprint.log";

/// Install a file-backed subscriber. The TUI owns stdout, so nothing is ever
/// logged to the terminal. Keep the returned guard alive until exit.
pub fn init(log_dir: &Path, verbose: bool) -> Result<Option<WorkerGuard>> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => Ok(Some(guard)),
        // a global subscriber is already installed
        Err(_) => Ok(None),
    }
}

/// Log panics before the default hook prints them
pub fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "keysprint::panic", %info, "panic");
            default_panic(info);
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn init_creates_log_dir() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let _guard = init(&log_dir, false).unwrap();
        assert!(log_dir.is_dir());
    }
}
