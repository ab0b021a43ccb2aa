use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error types for the watch-and-convert pipeline
#[derive(Error, Debug)]
pub enum ConverterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Watcher is already running on '{}'", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("File '{}' did not become readable within {timeout:?}", path.display())]
    ReadinessTimeout { path: PathBuf, timeout: Duration },

    #[error("Conversion of '{}' with '{program}' failed: {reason}", path.display())]
    ConversionProcess {
        path: PathBuf,
        program: String,
        reason: String,
    },

    #[error("Failed to delete original '{}': {source}", path.display())]
    Deletion {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Filesystem monitor failed: {0}")]
    MonitorFatal(String),

    #[error("Configuration store error for '{}': {reason}", path.display())]
    ConfigStore { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConverterError {
    /// Pipeline stage the error was raised in, used as a log field
    pub fn stage(&self) -> &'static str {
        match self {
            ConverterError::InvalidConfiguration(_) | ConverterError::AlreadyRunning(_) => {
                "configuration"
            }
            ConverterError::ReadinessTimeout { .. } => "readiness",
            ConverterError::ConversionProcess { .. } => "conversion",
            ConverterError::Deletion { .. } => "deletion",
            ConverterError::MonitorFatal(_) => "monitor",
            ConverterError::ConfigStore { .. } => "config-store",
            ConverterError::Io(_) => "io",
        }
    }
}

impl From<notify::Error> for ConverterError {
    fn from(err: notify::Error) -> Self {
        ConverterError::MonitorFatal(err.to_string())
    }
}

/// Convenience Result type with ConverterError
pub type Result<T> = std::result::Result<T, ConverterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let err = ConverterError::ReadinessTimeout {
            path: PathBuf::from("photo.jxr"),
            timeout: Duration::from_secs(10),
        };
        assert_eq!(err.stage(), "readiness");
        assert!(err.to_string().contains("photo.jxr"));

        let err = ConverterError::Deletion {
            path: PathBuf::from("photo.jxr"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.stage(), "deletion");
        assert!(err.to_string().contains("denied"));
    }
}
