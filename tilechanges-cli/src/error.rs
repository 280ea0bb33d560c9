//! CLI error type.

use std::fmt;

use tilechanges::config::ConfigError;
use tilechanges::logging::LoggingError;
use tilechanges::{ChangesError, ErrorKind};

/// Errors surfaced to the command line.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file or key problem.
    Config(String),

    /// Bad command-line input.
    Input(String),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// A change query or recording failed.
    Changes(ChangesError),

    /// Output could not be written.
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input(_) | CliError::Config(_) => 2,
            CliError::Changes(e) => match e.kind() {
                ErrorKind::Validation => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Internal => 1,
            },
            CliError::Logging(_) | CliError::Output(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Input(msg) => write!(f, "Invalid input: {}", msg),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Changes(e) => write!(f, "{}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Changes(e) => Some(e),
            CliError::Config(_) | CliError::Input(_) | CliError::Output(_) => None,
        }
    }
}

impl From<ChangesError> for CliError {
    fn from(e: ChangesError) -> Self {
        CliError::Changes(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Input("x".into()).exit_code(), 2);
        assert_eq!(
            CliError::from(ChangesError::UnknownCollection("roads".into())).exit_code(),
            3
        );
        assert_eq!(
            CliError::from(ChangesError::Validation("bad".into())).exit_code(),
            2
        );
    }

    #[test]
    fn test_display() {
        let err = CliError::from(ChangesError::UnknownCollection("roads".into()));
        assert_eq!(err.to_string(), "Unknown collection: roads");
        assert_eq!(
            CliError::Config("missing".into()).to_string(),
            "Configuration error: missing"
        );
    }
}
