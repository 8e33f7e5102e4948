/// `load_config` module: loads the static YAML server configuration and applies
/// environment overrides.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into type-safe structs; every section is optional
///   and falls back to defaults
/// - Apply the `PORT` environment override on top of the file
/// - Surface clear diagnostics: any failure in loading results in an `anyhow` error
///   naming the file and the cause
///
/// Credentials are never read from this file; they arrive with each upload request.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub limits: LimitsSection,
    pub github: GitHubSection,
    /// Where uploaded blobs are spooled; the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Ceiling for receiving one upload's multipart body. The batch itself always
    /// runs to completion once received.
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            request_timeout_secs: 600,
        }
    }
}

/// Intake limits, checked before the synchronisation engine sees a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            max_files: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub api_base_url: String,
    pub user_agent: String,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".into(),
            user_agent: concat!("repo-drop/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Loads a static YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: AppConfig = if config_content.trim().is_empty() {
        AppConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    apply_env_overrides(&mut config)?;
    config.trace_loaded();
    Ok(config)
}

/// Defaults plus environment overrides, for running without a config file.
pub fn default_config() -> Result<AppConfig> {
    let mut config = AppConfig::default();
    apply_env_overrides(&mut config)?;
    config.trace_loaded();
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(raw) = std::env::var("PORT") {
        config.server.port = raw
            .parse()
            .with_context(|| format!("PORT must be a valid port number, got {raw:?}"))?;
        info!(port = config.server.port, "PORT override applied from environment");
    }
    Ok(())
}

impl AppConfig {
    pub fn trace_loaded(&self) {
        info!(
            host = %self.server.host,
            port = self.server.port,
            max_file_size = self.limits.max_file_size,
            max_files = self.limits.max_files,
            api_base_url = %self.github.api_base_url,
            "Loaded config"
        );
    }
}
