use std::collections::HashMap;
use std::path::{Path, PathBuf};

use provisioner_clients::http::ServiceEndpoint;
use provisioner_core::settings::{parse_roles, PackageManager, ProvisioningSettings};

/// Startup configuration failure. Always names the offending key or file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {reason}", path.display())]
    Settings { path: PathBuf, reason: String },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Bearer token required on every mutating and job endpoint.
    pub api_token: String,
    pub nexus: ServiceEndpoint,
    pub iq: ServiceEndpoint,
    /// Roles every user keeps. At least one.
    pub base_roles: Vec<String>,
    pub extra_roles: Vec<String>,
    /// Inbound HTTP handler timeout in seconds (default: `15`).
    pub request_timeout_secs: u64,
    /// Timeout for every outbound upstream call in seconds (default: `30`).
    pub upstream_timeout_secs: u64,
    /// Grace period for in-flight handlers on shutdown (default: `5`).
    pub shutdown_timeout_secs: u64,
    pub organizations_file: PathBuf,
    pub package_managers_file: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Default                       |
    /// |--------------------------|-------------------------------|
    /// | `API_HOST`               | `127.0.0.1`                   |
    /// | `PORT`                   | `5000`                        |
    /// | `API_TOKEN`              | required                      |
    /// | `NEXUS_URL`              | required                      |
    /// | `NEXUS_USERNAME`         | required                      |
    /// | `NEXUS_PASSWORD`         | required                      |
    /// | `IQSERVER_URL`           | required                      |
    /// | `IQSERVER_USERNAME`      | required                      |
    /// | `IQSERVER_PASSWORD`      | required                      |
    /// | `BASE_ROLE`              | required, comma-separated     |
    /// | `EXTRA_ROLE`             | empty, comma-separated        |
    /// | `REQUEST_TIMEOUT_SECS`   | `15`                          |
    /// | `UPSTREAM_TIMEOUT_SECS`  | `30`                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `5`                           |
    /// | `ORGANIZATIONS_FILE`     | `config/organizations.json`   |
    /// | `PACKAGE_MANAGERS_FILE`  | `config/packageManager.json`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary key source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let host = var("API_HOST").unwrap_or_else(|| "127.0.0.1".into());

        let port = match var("PORT") {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "PORT",
                        reason: format!("'{raw}' is not a port between 1 and 65535"),
                    })
                }
            },
            None => 5000,
        };

        let api_token = required("API_TOKEN")?;

        let nexus = ServiceEndpoint {
            base_url: url(required("NEXUS_URL")?, "NEXUS_URL")?,
            username: required("NEXUS_USERNAME")?,
            password: required("NEXUS_PASSWORD")?,
        };
        let iq = ServiceEndpoint {
            base_url: url(required("IQSERVER_URL")?, "IQSERVER_URL")?,
            username: required("IQSERVER_USERNAME")?,
            password: required("IQSERVER_PASSWORD")?,
        };

        let base_roles = parse_roles(&var("BASE_ROLE").unwrap_or_default());
        if base_roles.is_empty() {
            return Err(ConfigError::Invalid {
                key: "BASE_ROLE",
                reason: "at least one role is required".into(),
            });
        }
        let extra_roles = parse_roles(&var("EXTRA_ROLE").unwrap_or_default());

        let request_timeout_secs = secs(var("REQUEST_TIMEOUT_SECS"), "REQUEST_TIMEOUT_SECS", 15)?;
        let upstream_timeout_secs =
            secs(var("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS", 30)?;
        let shutdown_timeout_secs =
            secs(var("SHUTDOWN_TIMEOUT_SECS"), "SHUTDOWN_TIMEOUT_SECS", 5)?;

        let organizations_file = var("ORGANIZATIONS_FILE")
            .unwrap_or_else(|| "config/organizations.json".into())
            .into();
        let package_managers_file = var("PACKAGE_MANAGERS_FILE")
            .unwrap_or_else(|| "config/packageManager.json".into())
            .into();

        Ok(Self {
            host,
            port,
            api_token,
            nexus,
            iq,
            base_roles,
            extra_roles,
            request_timeout_secs,
            upstream_timeout_secs,
            shutdown_timeout_secs,
            organizations_file,
            package_managers_file,
        })
    }

    /// Read the organization map and package manager catalogue and combine
    /// them with the configured roles.
    pub fn load_settings(&self) -> Result<ProvisioningSettings, ConfigError> {
        let organizations: HashMap<String, String> = read_json(&self.organizations_file)?;
        let package_managers: HashMap<String, PackageManager> =
            read_json(&self.package_managers_file)?;

        let settings = ProvisioningSettings {
            organizations,
            package_managers,
            base_roles: self.base_roles.clone(),
            extra_roles: self.extra_roles.clone(),
        };
        settings
            .validate_package_managers()
            .map_err(|e| ConfigError::Settings {
                path: self.package_managers_file.clone(),
                reason: e.to_string(),
            })?;
        Ok(settings)
    }
}

fn url(raw: String, key: &'static str) -> Result<String, ConfigError> {
    reqwest::Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        key,
        reason: format!("'{raw}': {e}"),
    })?;
    Ok(raw)
}

fn secs(raw: Option<String>, key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match raw {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            reason: format!("'{raw}' is not a number of seconds"),
        }),
        None => Ok(default),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
