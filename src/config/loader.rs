//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable consulted first for the listening port.
pub const PORT_ENV_VAR: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("invalid port {value:?} from {origin}")]
    InvalidPort { origin: &'static str, value: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the file when one is given, otherwise validate the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = GatewayConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

/// Pick the listening port: environment first, then the CLI argument,
/// then the configured default.
pub fn resolve_port(
    env_value: Option<&str>,
    cli_port: Option<u16>,
    configured: u16,
) -> Result<u16, ConfigError> {
    if let Some(raw) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
        return raw.parse().map_err(|_| ConfigError::InvalidPort {
            origin: PORT_ENV_VAR,
            value: raw.to_string(),
        });
    }

    Ok(cli_port.unwrap_or(configured))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn env_port_wins_over_argument() {
        assert_eq!(resolve_port(Some("5000"), Some(6000), 8080).unwrap(), 5000);
    }

    #[test]
    fn argument_wins_over_default() {
        assert_eq!(resolve_port(None, Some(6000), 8080).unwrap(), 6000);
        assert_eq!(resolve_port(Some("  "), Some(6000), 8080).unwrap(), 6000);
    }

    #[test]
    fn falls_back_to_configured_port() {
        assert_eq!(resolve_port(None, None, 8080).unwrap(), 8080);
    }

    #[test]
    fn rejects_garbage_env_port() {
        let err = resolve_port(Some("eighty"), None, 8080).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { origin: "PORT", .. }));
    }

    #[test]
    fn loads_and_validates_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[transfer]\nblock_bytes = 0").unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("transfer.block_bytes"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
