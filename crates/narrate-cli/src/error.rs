//! CLI-specific error types and exit codes.
//!
//! Maps render errors to user-facing categories and sysexits-style exit
//! codes.

use narrate_core::{ConfigError, SettingsError};
use narrate_render::RenderError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Bad input: unreadable settings, empty script, invalid id.
    #[error("Invalid input: {0}")]
    Input(String),

    /// Unknown render id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// File or storage I/O failure.
    #[error("IO error: {0}")]
    Io(String),

    /// Process configuration (environment, flags).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Voice or media engine could not be used.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Waiting for a render gave up.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The render itself failed.
    #[error("{0}")]
    Render(String),
}

impl CliError {
    /// Map error to an exit code.
    ///
    /// Codes follow sysexits.h:
    /// - 1: render failed
    /// - 65: EX_DATAERR
    /// - 66: EX_NOINPUT
    /// - 69: EX_UNAVAILABLE
    /// - 74: EX_IOERR
    /// - 75: EX_TEMPFAIL
    /// - 78: EX_CONFIG
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Render(_) => 1,
            Self::Input(_) => 65,
            Self::NotFound(_) => 66,
            Self::Unavailable(_) => 69,
            Self::Io(_) => 74,
            Self::Timeout(_) => 75,
            Self::Config(_) => 78,
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        let message = err.report();
        match err {
            RenderError::InvalidSettings(_) | RenderError::EmptyScript | RenderError::NoChunks => {
                Self::Input(message)
            }
            RenderError::NotFound(_) => Self::NotFound(message),
            RenderError::Fetch(ref e) if e.is_not_found() => Self::NotFound(message),
            RenderError::Fetch(_) | RenderError::Storage(_) => Self::Io(message),
            RenderError::Synthesis { .. } => Self::Unavailable(message),
            RenderError::Timeout(_) => Self::Timeout(message),
            _ => Self::Render(message),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use narrate_core::{RenderId, SynthesisError};

    use super::*;

    #[test]
    fn test_render_errors_map_to_categories() {
        let err: CliError = RenderError::EmptyScript.into();
        assert_eq!(err.exit_code(), 65);

        let err: CliError = RenderError::NotFound(RenderId::generate()).into();
        assert_eq!(err.exit_code(), 66);

        let err: CliError = RenderError::Synthesis {
            index: 2,
            source: SynthesisError::upstream(Some(401), "bad key"),
        }
        .into();
        assert_eq!(err.exit_code(), 69);
        assert!(err.to_string().contains("bad key"));

        let err: CliError = RenderError::Timeout(Duration::from_secs(5)).into();
        assert_eq!(err.exit_code(), 75);
    }

    #[test]
    fn test_io_error_maps_to_ioerr() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.exit_code(), 74);
    }
}
