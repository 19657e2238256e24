//! Logging configuration for wirebox.
//!
//! Compiled only when a subscriber feature is active: `logging-pretty` for
//! colorful development output, `logging-json` for structured production
//! output. The plain `logging` feature emits `tracing` events without
//! pulling in a subscriber.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Builder for the wirebox logging subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }
}

impl LoggingBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the level to TRACE (most verbose).
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// Sets the level to DEBUG.
    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Sets the level to INFO.
    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Installs the global subscriber. `RUST_LOG` takes precedence over
    /// the configured level when set.
    pub fn init(self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("wirebox={}", self.level)));

        #[cfg(feature = "logging-json")]
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
            return;
        }

        #[cfg(all(feature = "logging-pretty", not(feature = "logging-json")))]
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .pretty()
                .init();
        }
    }
}

/// Returns a logging builder for custom configuration.
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initializes logging with default settings.
pub fn init() {
    LoggingBuilder::new().init();
}
