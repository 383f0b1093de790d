//! Image cache configuration.

pub mod app_config;

pub use app_config::{CACHE_SUBDIR, CacheConfig, ConfigError, LogLevel};
