use std::path::Path;

use error_stack::{Report, ResultExt};
use launchpad_core::types::GlobalConfig;

use super::errors::{CliError, CliErrorExt};

/// Loads the global config, picking the parser from the file extension.
pub fn load_config(path: &str) -> Result<GlobalConfig, Report<CliError>> {
    let format = match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("json") => "json",
        Some("yml") | Some("yaml") => "yaml",
        other => {
            return Err(cli_error!(
                CliError::ArgumentError,
                "unsupported config extension '{}', expected .json, .yml or .yaml",
                other.unwrap_or_default()
            ))
            .with_config_file_info(path, "unknown");
        }
    };

    let contents = std::fs::read_to_string(path)
        .change_context(CliError::ConfigError)
        .attach_printable_lazy(|| format!("unable to read {}", path))
        .with_config_file_info(path, format)?;

    let config = if format == "json" {
        serde_json::from_str::<GlobalConfig>(&contents)
            .change_context(CliError::ConfigError)
            .attach_printable("malformed json config")
    } else {
        serde_yml::from_str::<GlobalConfig>(&contents)
            .change_context(CliError::ConfigError)
            .attach_printable("malformed yaml config")
    };
    config.with_config_file_info(path, format)
}
