//! On-disk configuration and option precedence.
//!
//! Values given on the command line win over `config.toml`, which wins over
//! built-in defaults. Empty strings in the file count as unset.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{de::Error as _, Deserialize, Deserializer};

use crate::quality::{Quality, QualityError};

pub const DEFAULT_DATA_DIR: &str = "user_data";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

const DEFAULT_CONFIG: &str = r#"[config]
sessionid_ss = ""
tt_target_idc = ""
proxy = ""
"#;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error parsing config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error(transparent)]
    Quality(#[from] QualityError),
    #[error("Invalid timeout {0:?}, expected a positive number of seconds")]
    InvalidTimeout(String),
    #[error("Invalid value {value:?} for {key}")]
    InvalidFlag { key: &'static str, value: String },
}

/// Locations under the program data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub download_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: Option<&Path>) -> Self {
        let data_dir = data_dir
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let data_dir = std::path::absolute(&data_dir).unwrap_or(data_dir);

        Self {
            config_file: data_dir.join("config.toml"),
            download_dir: data_dir.join("downloads"),
            data_dir,
        }
    }

    /// Creates the data and download directories, and writes a default
    /// `config.toml` when there is none.
    pub fn initialize(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.download_dir)?;

        if !self.config_file.is_file() {
            debug!("Writing default config to {}", self.config_file.display());
            std::fs::write(&self.config_file, DEFAULT_CONFIG)?;
        }

        Ok(())
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|v| !v.is_empty()))
}

/// Accepts either a typed value or `""`, which reads as unset.
fn empty_or<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ValueOrText<T> {
        Value(T),
        Text(String),
    }

    match Option::<ValueOrText<T>>::deserialize(deserializer)? {
        Some(ValueOrText::Value(v)) => Ok(Some(v)),
        Some(ValueOrText::Text(s)) if s.is_empty() => Ok(None),
        Some(ValueOrText::Text(s)) => Err(D::Error::custom(format!("unexpected string {:?}", s))),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    config: ConfigTable,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigTable {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub sessionid_ss: Option<String>,
    #[serde(default, alias = "tt-target-idc", deserialize_with = "empty_as_none")]
    pub tt_target_idc: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub proxy: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub quality: Option<String>,
    #[serde(default, deserialize_with = "empty_or")]
    pub wait_until_live: Option<bool>,
    #[serde(default, deserialize_with = "empty_or")]
    pub timeout: Option<i64>,
}

impl ConfigTable {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(data)?;
        Ok(file.config)
    }
}

/// Values supplied by the caller for this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub proxy: Option<String>,
    pub quality: Option<String>,
    pub wait_until_live: Option<bool>,
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    SessionIdSs,
    TtTargetIdc,
    Proxy,
    Quality,
    WaitUntilLive,
    Timeout,
}

impl OptionKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionIdSs => "sessionid_ss",
            Self::TtTargetIdc => "tt_target_idc",
            Self::Proxy => "proxy",
            Self::Quality => "quality",
            Self::WaitUntilLive => "wait_until_live",
            Self::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    file: ConfigTable,
    pub overrides: Overrides,
}

impl Options {
    pub fn new(file: ConfigTable, overrides: Overrides) -> Self {
        Self { file, overrides }
    }

    pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        Ok(Self::new(ConfigTable::load(path)?, overrides))
    }

    /// Merged raw value for `key`, `None` when neither source sets it.
    pub fn get_option(&self, key: OptionKey) -> Option<String> {
        let (o, f) = (&self.overrides, &self.file);
        let value = match key {
            OptionKey::SessionIdSs => f.sessionid_ss.clone(),
            OptionKey::TtTargetIdc => f.tt_target_idc.clone(),
            OptionKey::Proxy => o.proxy.clone().or_else(|| f.proxy.clone()),
            OptionKey::Quality => o.quality.clone().or_else(|| f.quality.clone()),
            OptionKey::WaitUntilLive => o
                .wait_until_live
                .or(f.wait_until_live)
                .map(|v| v.to_string()),
            OptionKey::Timeout => o
                .timeout
                .map(|v| v.to_string())
                .or_else(|| f.timeout.map(|v| v.to_string())),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Requested quality, lower-cased and validated. Defaults to `original`.
    pub fn quality(&self) -> Result<Quality, ConfigError> {
        match self.get_option(OptionKey::Quality) {
            Some(q) => Ok(q.to_lowercase().parse()?),
            None => Ok(Quality::Original),
        }
    }

    pub fn wait_until_live(&self) -> Result<bool, ConfigError> {
        match self.get_option(OptionKey::WaitUntilLive) {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidFlag {
                key: OptionKey::WaitUntilLive.as_str(),
                value: v,
            }),
            None => Ok(false),
        }
    }

    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        match self.get_option(OptionKey::Timeout) {
            Some(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
                _ => Err(ConfigError::InvalidTimeout(v)),
            },
            None => Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
        }
    }
}
