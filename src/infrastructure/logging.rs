//! Tracing subscriber setup for hosts embedding the image cache.

use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::config::CacheConfig;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured level. When `log_path` is set, events
/// are appended to that file without ANSI colors; otherwise they go to stderr.
///
/// # Errors
/// Returns error if the log file or its parent directory cannot be created,
/// or if a global subscriber is already installed.
pub fn init_logging(config: &CacheConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .try_init()?;

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::error;

    #[test]
    fn test_file_layer_writes_events() {
        let temp = tempfile::TempDir::new().unwrap();
        let log_path = temp.path().join("logs").join("image_cache.log");
        let config = CacheConfig {
            log_path: Some(log_path.clone()),
            ..CacheConfig::default()
        };

        init_logging(&config).unwrap();
        error!(marker = "image-cache-log-check", "Test event");

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("image-cache-log-check"));
        assert!(!content.contains("\u{1b}["));

        assert!(init_logging(&config).is_err());
    }
}
