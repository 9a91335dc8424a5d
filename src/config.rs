use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub const HOST_LIST: &str = "HOST_LIST";
pub const STORE_HOST: &str = "STORE_HOST";
pub const STORE_PORT: &str = "STORE_PORT";
pub const STORE_PROTOCOL: &str = "STORE_PROTOCOL";
pub const STORE_DATABASE: &str = "STORE_DATABASE";
pub const STORE_USERNAME: &str = "STORE_USERNAME";
pub const STORE_PASSWORD: &str = "STORE_PASSWORD";
pub const DEVICE_PORT: &str = "DEVICE_PORT";
pub const REPORT_MODE: &str = "REPORT_MODE";

/// What each host contributes to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    /// One `state` point per active adapter slot plus the `bandwidth` point.
    #[default]
    Full,
    /// Only the `bandwidth` point.
    Bandwidth,
}

impl FromStr for ReportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(ReportMode::Full),
            "bandwidth" => Ok(ReportMode::Bandwidth),
            other => Err(format!("expected 'full' or 'bandwidth', got '{other}'")),
        }
    }
}

/// Optional YAML file; every key can also come from the environment, which wins.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub host_list: Vec<String>,
    #[serde(default)]
    pub device_port: Option<u16>,
    #[serde(default)]
    pub report_mode: Option<ReportMode>,
    #[serde(default)]
    pub store: FileStoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileStoreConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<String>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub hosts: Vec<String>,
    pub device_port: u16,
    pub report_mode: ReportMode,
    pub store: StoreConfig,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub protocol: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl StoreConfig {
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("{} must be specified", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl FileConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })
    }
}

impl Config {
    pub fn from_env(file: FileConfig, mode: Option<ReportMode>) -> Result<Self, ConfigError> {
        Self::resolve_with_mode(file, |key| std::env::var(key).ok(), mode)
    }

    /// Like [`Config::resolve`], but an explicit `mode` wins over both sources
    /// and `REPORT_MODE` is not read at all.
    pub fn resolve_with_mode(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
        mode: Option<ReportMode>,
    ) -> Result<Self, ConfigError> {
        let Some(mode) = mode else {
            return Self::resolve(file, env);
        };
        let mut cfg = Self::resolve(file, |key: &str| {
            if key == REPORT_MODE {
                None
            } else {
                env(key)
            }
        })?;
        cfg.report_mode = mode;
        Ok(cfg)
    }

    /// Overlays `env` on top of `file` and checks that every required key ended
    /// up with a value. All missing keys are reported at once.
    pub fn resolve(
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let hosts = match lookup(HOST_LIST) {
            Some(list) => split_hosts(list.split(',')),
            None => split_hosts(file.host_list.iter().map(String::as_str)),
        };
        let store_host = lookup(STORE_HOST).or(non_empty(file.store.host));
        let database = lookup(STORE_DATABASE).or(non_empty(file.store.database));
        let username = lookup(STORE_USERNAME).or(non_empty(file.store.username));
        let password = lookup(STORE_PASSWORD).or(non_empty(file.store.password));

        let mut missing = Vec::new();
        if hosts.is_empty() {
            missing.push(HOST_LIST);
        }
        for (key, value) in [
            (STORE_HOST, &store_host),
            (STORE_DATABASE, &database),
            (STORE_USERNAME, &username),
            (STORE_PASSWORD, &password),
        ] {
            if value.is_none() {
                missing.push(key);
            }
        }
        let (Some(store_host), Some(database), Some(username), Some(password)) =
            (store_host, database, username, password)
        else {
            return Err(ConfigError::Missing(missing));
        };
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let device_port = match lookup(DEVICE_PORT) {
            Some(raw) => parse_port(DEVICE_PORT, &raw)?,
            None => file.device_port.unwrap_or_else(default_device_port),
        };
        let store_port = match lookup(STORE_PORT) {
            Some(raw) => parse_port(STORE_PORT, &raw)?,
            None => file.store.port.unwrap_or_else(default_store_port),
        };
        let report_mode = match lookup(REPORT_MODE) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: REPORT_MODE,
                reason,
            })?,
            None => file.report_mode.unwrap_or_default(),
        };
        let protocol = lookup(STORE_PROTOCOL)
            .or(non_empty(file.store.protocol))
            .unwrap_or_else(default_store_protocol)
            .to_ascii_lowercase();

        let cfg = Config {
            hosts,
            device_port,
            report_mode,
            store: StoreConfig {
                host: store_host,
                port: store_port,
                protocol,
                database,
                username,
                password,
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_port == 0 {
            return Err(ConfigError::Invalid {
                key: DEVICE_PORT,
                reason: "port must be in range 1..65535".to_string(),
            });
        }
        if self.store.port == 0 {
            return Err(ConfigError::Invalid {
                key: STORE_PORT,
                reason: "port must be in range 1..65535".to_string(),
            });
        }
        if self.store.protocol != "http" && self.store.protocol != "https" {
            return Err(ConfigError::Invalid {
                key: STORE_PROTOCOL,
                reason: format!("expected 'http' or 'https', got '{}'", self.store.protocol),
            });
        }
        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn split_hosts<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    items
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_port(key: &'static str, raw: &str) -> Result<u16, ConfigError> {
    raw.parse::<u16>().map_err(|err| ConfigError::Invalid {
        key,
        reason: format!("'{raw}' is not a port number: {err}"),
    })
}

const fn default_device_port() -> u16 {
    8080
}

const fn default_store_port() -> u16 {
    8086
}

fn default_store_protocol() -> String {
    "http".to_string()
}
