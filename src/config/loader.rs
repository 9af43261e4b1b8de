//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides the bind address.
pub const ENV_BIND_ADDRESS: &str = "GATEWAY_BIND_ADDRESS";
/// Supplies the webhook signing secret.
pub const ENV_WEBHOOK_SECRET: &str = "GATEWAY_WEBHOOK_SECRET";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
    finalize(config)
}

/// Apply environment overrides to a config and validate the result.
pub fn finalize(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(addr) = lookup(ENV_BIND_ADDRESS).filter(|v| !v.is_empty()) {
        config.listener.bind_address = addr;
    }
    if let Some(secret) = lookup(ENV_WEBHOOK_SECRET).filter(|v| !v.is_empty()) {
        config.webhooks.secret = secret;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |name| match name {
            ENV_BIND_ADDRESS => Some("127.0.0.1:9000".to_string()),
            ENV_WEBHOOK_SECRET => Some("whsec_test".to_string()),
            _ => None,
        });
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.webhooks.secret, "whsec_test");
    }

    #[test]
    fn test_empty_env_is_ignored() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.webhooks.secret.is_empty());
    }

    #[test]
    fn test_load_config_file() {
        let path = std::env::temp_dir().join(format!("gateway-config-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[idempotency]\nretention_secs = 0\nin_flight_wait_secs = 3\n[timeouts]\nrequest_secs = 5\n",
        )
        .unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref e) if e.len() == 1));
        assert!(err.to_string().contains("idempotency.retention_secs"));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
