use std::io;
use std::path::PathBuf;

/// Errors raised by the tailing core.
///
/// Only `Config` and `FileAccess` are fatal; they can happen before the watch
/// loop starts. Everything else is logged by the loop and retried on the next
/// cycle.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot access log file {}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}", path.display())]
    TransientRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to publish {}", path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl WatchError {
    /// Whether this error should abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::FileAccess { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let config = WatchError::Config("poll_interval_ms must be > 0".to_string());
        assert!(config.is_fatal());

        let transient = WatchError::TransientRead {
            path: PathBuf::from("app.log"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert!(!transient.is_fatal());
        assert_eq!(transient.to_string(), "failed to read app.log");
    }
}
