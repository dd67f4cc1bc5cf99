//! Process-wide logger setup.
//!
//! The logger is configured once from a [`LogConfig`] built in `main`; there is
//! no global switch to flip timestamps on or off after initialization.

use env_logger::fmt::TimestampPrecision;
use env_logger::{Builder, Env};
use log::LevelFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogConfig {
    pub timestamps: bool,
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            timestamps: true,
            level: LevelFilter::Info,
        }
    }
}

impl LogConfig {
    pub fn builder(&self) -> Builder {
        let mut builder = Builder::new();
        builder.filter_level(self.level);
        // RUST_LOG still wins over the configured level.
        builder.parse_env(Env::default());
        if self.timestamps {
            builder.format_timestamp(Some(TimestampPrecision::Millis));
        } else {
            builder.format_timestamp(None);
        }
        builder
    }
}

/// Installs the logger. Calling this twice is harmless; the second call is ignored.
pub fn init(config: LogConfig) {
    if config.builder().try_init().is_err() {
        log::debug!("logger already initialized");
    }
}
