use error_stack::{Context, Report};
use launchpad_core::types::LaunchpadError;
use std::fmt;

/// CLI-specific error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliError {
    /// Config file missing, unreadable or malformed
    ConfigError,
    /// Environment unknown from config
    EnvironmentError,
    /// Network could not be launched or connected
    LaunchError,
    /// Test runner could not be invoked or its results read
    TestError,
    /// Invalid command-line arguments
    ArgumentError,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::ConfigError => write!(f, "Configuration error"),
            CliError::EnvironmentError => write!(f, "Environment selection error"),
            CliError::LaunchError => write!(f, "Network launch failed"),
            CliError::TestError => write!(f, "Test execution failed"),
            CliError::ArgumentError => write!(f, "Invalid command arguments"),
        }
    }
}

impl Context for CliError {}

impl From<LaunchpadError> for CliError {
    fn from(error: LaunchpadError) -> Self {
        match error {
            LaunchpadError::ConfigDefect => CliError::ConfigError,
            LaunchpadError::EnvironmentNotFound => CliError::EnvironmentError,
            LaunchpadError::TestExecution => CliError::TestError,
            LaunchpadError::LaunchFailed
            | LaunchpadError::ReadinessTimeout
            | LaunchpadError::ProviderUnreachable
            | LaunchpadError::ProviderTimeout
            | LaunchpadError::Teardown => CliError::LaunchError,
        }
    }
}

/// Config file location and the format it was parsed as
#[derive(Debug, Clone)]
pub struct ConfigFileInfo {
    pub path: String,
    pub format: String,
}

impl fmt::Display for ConfigFileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Config file '{}' (format: {})", self.path, self.format)
    }
}

pub trait CliErrorExt {
    fn with_config_file_info(self, path: impl Into<String>, format: impl Into<String>) -> Self;
}

impl<T> CliErrorExt for Result<T, Report<CliError>> {
    fn with_config_file_info(self, path: impl Into<String>, format: impl Into<String>) -> Self {
        self.map_err(|e| e.attach(ConfigFileInfo { path: path.into(), format: format.into() }))
    }
}

#[macro_export]
macro_rules! cli_error {
    ($error:expr, $($arg:tt)*) => {{
        error_stack::Report::new($error).attach_printable(format!($($arg)*))
    }};
}

/// Lifts a core report into the CLI layer, keeping its attachments.
pub trait IntoCliError<T> {
    fn into_cli_error(self) -> Result<T, Report<CliError>>;
}

impl<T> IntoCliError<T> for Result<T, Report<LaunchpadError>> {
    fn into_cli_error(self) -> Result<T, Report<CliError>> {
        self.map_err(|report| {
            let kind = CliError::from(*report.current_context());
            report.change_context(kind)
        })
    }
}
