use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{info, warn};

use crate::backend::datadog::DatadogSettings;

const DEFAULT_CONFIG_PATH: &str = "/config/ddmon.yaml";

/// Top-level configuration for the ddmon tool server.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "AppConfig::default_site")]
    pub site: String,
    /// Replaces the `https://api.{site}` origin, e.g. for a proxy.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub http: HttpConfig,
}

impl AppConfig {
    fn default_site() -> String {
        "datadoghq.com".to_string()
    }

    pub fn datadog_settings(&self) -> DatadogSettings {
        DatadogSettings {
            api_key: self.api_key.clone(),
            app_key: self.app_key.clone(),
            site: self.site.clone(),
            api_url: self.api_url.clone(),
            timeout: self.http.timeout,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: Self::default_site(),
            api_url: None,
            api_key: String::new(),
            app_key: String::new(),
            server: ServerConfig::default(),
            limits: Limits::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Identity advertised to the host on `initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_name")]
    pub name: String,
    #[serde(default = "ServerConfig::default_version")]
    pub version: String,
}

impl ServerConfig {
    fn default_name() -> String {
        "datadog-mcp-server".to_string()
    }

    fn default_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            version: Self::default_version(),
        }
    }
}

/// Default page sizes used when a tool call does not specify one.
#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    #[serde(default = "Limits::default_alerts")]
    pub alerts: u32,
    #[serde(default = "Limits::default_logs")]
    pub logs: u32,
    #[serde(default = "Limits::default_analysis_logs")]
    pub analysis_logs: u32,
}

impl Limits {
    const fn default_alerts() -> u32 {
        10
    }

    const fn default_logs() -> u32 {
        100
    }

    const fn default_analysis_logs() -> u32 {
        50
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            alerts: Self::default_alerts(),
            logs: Self::default_logs(),
            analysis_logs: Self::default_analysis_logs(),
        }
    }
}

/// Outbound HTTP settings. No timeout unless one is configured.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfig {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Load configuration from a YAML file, falling back to defaults + env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let target_path = if let Some(path) = path {
        path.to_path_buf()
    } else if let Ok(env_path) = env::var("DDMON_CONFIG") {
        PathBuf::from(env_path)
    } else {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    };

    let mut config = match try_parse_file(&target_path)? {
        Some(cfg) => {
            info!(path = %target_path.display(), "loaded configuration");
            cfg
        }
        None => {
            warn!(path = %target_path.display(), "config file not found; using built-in defaults");
            AppConfig::default()
        }
    };

    enforce_yaml_policy(&config)?;
    apply_env_overrides(&mut config, |key| env::var(key))?;
    ensure_required_secrets(&config)?;
    Ok(config)
}

fn try_parse_file(path: &Path) -> Result<Option<AppConfig>> {
    match fs::read_to_string(path) {
        Ok(raw) => {
            let cfg = serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse YAML config at {}", path.display()))?;
            Ok(Some(cfg))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to read config file at {}", path.display()))
        }
    }
}

fn enforce_yaml_policy(config: &AppConfig) -> Result<()> {
    if !config.api_key.trim().is_empty() || !config.app_key.trim().is_empty() {
        bail!(
            "Remove `api_key`/`app_key` from the ddmon YAML config; set DD_API_KEY and DD_APP_KEY in the environment instead."
        );
    }
    Ok(())
}

fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Result<String, env::VarError>,
{
    if let Ok(site) = lookup("DD_SITE") {
        if !site.trim().is_empty() {
            config.site = site;
        }
    }

    for (name, slot) in [
        ("DD_API_KEY", &mut config.api_key),
        ("DD_APP_KEY", &mut config.app_key),
    ] {
        match lookup(name) {
            Ok(value) => {
                if value.trim().is_empty() {
                    bail!("Environment variable {name} is set but empty; populate it in your .env file.");
                }
                *slot = value;
            }
            Err(env::VarError::NotPresent) => {}
            Err(err) => return Err(err).with_context(|| format!("failed to read {name}")),
        }
    }

    Ok(())
}

fn ensure_required_secrets(config: &AppConfig) -> Result<()> {
    if config.api_key.trim().is_empty() {
        bail!("Missing Datadog API key. Set the DD_API_KEY environment variable (see .env.sample).");
    }
    if config.app_key.trim().is_empty() {
        bail!(
            "Missing Datadog application key. Set the DD_APP_KEY environment variable (see .env.sample)."
        );
    }
    Ok(())
}
