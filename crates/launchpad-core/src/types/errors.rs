use error_stack::{Context, Report};
use std::fmt;

/// Errors raised while orchestrating a test network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchpadError {
    /// Programming error: context queried before creation, created twice, or invalid config
    ConfigDefect,
    /// The requested environment is not declared in the configuration
    EnvironmentNotFound,
    /// A node process could not be spawned or exited before readiness
    LaunchFailed,
    /// A node process did not report readiness within the launch timeout
    ReadinessTimeout,
    /// A provider could not be reached or refused the handshake
    ProviderUnreachable,
    /// A provider did not complete its connection within the connect timeout
    ProviderTimeout,
    /// Disconnecting a provider or stopping a node failed
    Teardown,
    /// The test runner could not be invoked or its results could not be read
    TestExecution,
}

impl fmt::Display for LaunchpadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchpadError::ConfigDefect => write!(f, "Configuration defect"),
            LaunchpadError::EnvironmentNotFound => write!(f, "Environment not found"),
            LaunchpadError::LaunchFailed => write!(f, "Network launch failed"),
            LaunchpadError::ReadinessTimeout => write!(f, "Timed out waiting for node readiness"),
            LaunchpadError::ProviderUnreachable => write!(f, "Provider unreachable"),
            LaunchpadError::ProviderTimeout => write!(f, "Timed out connecting provider"),
            LaunchpadError::Teardown => write!(f, "Teardown failed"),
            LaunchpadError::TestExecution => write!(f, "Test execution failed"),
        }
    }
}

impl Context for LaunchpadError {}

pub type LaunchpadResult<T> = Result<T, Report<LaunchpadError>>;

/// Provider details for connection errors
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub kind: String,
    pub endpoint: String,
}

impl fmt::Display for ProviderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider '{}' ({}) at {}", self.name, self.kind, self.endpoint)
    }
}

/// Spawned process details for launch errors
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub command: String,
    pub args: Vec<String>,
    pub pid: Option<u32>,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Process `{} {}`", self.command, self.args.join(" "))?;
        if let Some(pid) = self.pid {
            write!(f, " (pid {})", pid)?;
        }
        Ok(())
    }
}

/// Environment lookup details
#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub name: String,
    pub known: Vec<String>,
}

impl fmt::Display for EnvironmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment '{}'", self.name)?;
        if self.known.is_empty() {
            write!(f, " (no environments defined)")
        } else {
            write!(f, " (defined: {})", self.known.join(", "))
        }
    }
}

/// Lifecycle state observed when a defect was detected
#[derive(Debug, Clone)]
pub struct LifecycleInfo {
    pub state: String,
}

impl fmt::Display for LifecycleInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lifecycle state: {}", self.state)
    }
}

/// Helper functions for attaching orchestration details to errors
pub trait LaunchpadErrorExt {
    /// Attach the provider being connected
    fn with_provider_info(
        self,
        name: impl Into<String>,
        kind: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self;

    /// Attach the process being launched
    fn with_process_info(
        self,
        command: impl Into<String>,
        args: &[String],
        pid: Option<u32>,
    ) -> Self;

    /// Attach the environment being looked up
    fn with_environment_info(self, name: impl Into<String>, known: Vec<String>) -> Self;

    fn with_lifecycle_info(self, state: impl fmt::Display) -> Self;
}

impl<T> LaunchpadErrorExt for Result<T, Report<LaunchpadError>> {
    fn with_provider_info(
        self,
        name: impl Into<String>,
        kind: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        self.map_err(|e| {
            e.attach(ProviderInfo {
                name: name.into(),
                kind: kind.into(),
                endpoint: endpoint.into(),
            })
        })
    }

    fn with_process_info(
        self,
        command: impl Into<String>,
        args: &[String],
        pid: Option<u32>,
    ) -> Self {
        self.map_err(|e| {
            e.attach(ProcessInfo { command: command.into(), args: args.to_vec(), pid })
        })
    }

    fn with_environment_info(self, name: impl Into<String>, known: Vec<String>) -> Self {
        self.map_err(|e| e.attach(EnvironmentInfo { name: name.into(), known }))
    }

    fn with_lifecycle_info(self, state: impl fmt::Display) -> Self {
        self.map_err(|e| e.attach(LifecycleInfo { state: state.to_string() }))
    }
}

/// Helper macro for creating launchpad errors
#[macro_export]
macro_rules! launchpad_error {
    ($error:expr, $($arg:tt)*) => {{
        error_stack::Report::new($error)
            .attach_printable(format!($($arg)*))
    }};
}
