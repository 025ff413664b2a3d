use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::equipment::EQUIPMENT_STATS_URL;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fleetimporter.config";
pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
pub const DEFAULT_TOKEN_PATH: &str = "token.yaml";

/// Console message printed before exiting with status 1.
pub const MISSING_OPTIONS_MESSAGE: &str = "All configuration options must be present.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {} is not valid YAML: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {} is not valid TOML: {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required configuration options: {}", fields.join(", "))]
    Missing { fields: Vec<&'static str> },

    #[error("unknown output mode '{0}' (expected 'file' or 'spreadsheet')")]
    InvalidOutputMode(String),
}

/// Where a run publishes its records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    #[serde(alias = "xml")]
    File,
    #[serde(alias = "sheets", alias = "google")]
    Spreadsheet,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::File => "file",
            OutputMode::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "xml" => Ok(OutputMode::File),
            "spreadsheet" | "sheets" | "google" => Ok(OutputMode::Spreadsheet),
            other => Err(ConfigError::InvalidOutputMode(other.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    samsara_auth_token: Option<String>,
    sheet_id: Option<String>,
    special_sheet_name: Option<String>,
    xml_file_name: Option<String>,
    output_mode: Option<OutputMode>,
    google_credentials_path: Option<PathBuf>,
    google_token_path: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    samsara_api_url: Option<String>,
}

/// Immutable run configuration, loaded once at startup.
#[derive(Clone)]
pub struct Config {
    pub samsara_auth_token: String,
    pub sheet_id: String,
    pub special_sheet_name: String,
    pub xml_file_name: PathBuf,
    pub output_mode: OutputMode,
    pub google_credentials_path: PathBuf,
    pub google_token_path: PathBuf,
    pub request_timeout: Option<Duration>,
    pub samsara_api_url: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("samsara_auth_token", &"<redacted>")
            .field("sheet_id", &self.sheet_id)
            .field("special_sheet_name", &self.special_sheet_name)
            .field("xml_file_name", &self.xml_file_name)
            .field("output_mode", &self.output_mode)
            .field("google_credentials_path", &self.google_credentials_path)
            .field("google_token_path", &self.google_token_path)
            .field("request_timeout", &self.request_timeout)
            .field("samsara_api_url", &self.samsara_api_url)
            .finish()
    }
}

impl Config {
    /// Reads and validates the config file. Files ending in `.toml` are parsed as TOML,
    /// everything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml_str(&contents).map_err(|err| with_path(err, path))
        } else {
            Self::from_yaml_str(&contents).map_err(|err| with_path(err, path))
        }
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        // An empty YAML document deserializes to nothing at all.
        let raw = if contents.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Yaml {
                path: PathBuf::new(),
                source,
            })?
        };
        raw.validate()
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents).map_err(|source| ConfigError::Toml {
            path: PathBuf::new(),
            source,
        })?;
        raw.validate()
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }
}

impl RawConfig {
    fn validate(self) -> Result<Config, ConfigError> {
        let mut missing = Vec::new();
        let mut require = |name: &'static str, value: Option<String>| match value {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let token = require("samsara_auth_token", self.samsara_auth_token);
        let sheet_id = require("sheet_id", self.sheet_id);
        let sheet_name = require("special_sheet_name", self.special_sheet_name);
        let xml_file_name = require("xml_file_name", self.xml_file_name);

        if !missing.is_empty() {
            return Err(ConfigError::Missing { fields: missing });
        }

        Ok(Config {
            samsara_auth_token: token,
            sheet_id,
            special_sheet_name: sheet_name,
            xml_file_name: PathBuf::from(xml_file_name),
            output_mode: self.output_mode.unwrap_or_default(),
            google_credentials_path: self
                .google_credentials_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            google_token_path: self
                .google_token_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_PATH)),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            samsara_api_url: self
                .samsara_api_url
                .unwrap_or_else(|| EQUIPMENT_STATS_URL.to_string()),
        })
    }
}

fn with_path(err: ConfigError, path: &Path) -> ConfigError {
    match err {
        ConfigError::Yaml { source, .. } => ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        },
        ConfigError::Toml { source, .. } => ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_mode_accepts_aliases() {
        assert_eq!("XML".parse::<OutputMode>().unwrap(), OutputMode::File);
        assert_eq!(
            " sheets ".parse::<OutputMode>().unwrap(),
            OutputMode::Spreadsheet
        );
        assert!(matches!(
            "carrier-pigeon".parse::<OutputMode>(),
            Err(ConfigError::InvalidOutputMode(_))
        ));
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = Config::from_yaml_str(
            "samsara_auth_token: super-secret\nsheet_id: s\nspecial_sheet_name: n\nxml_file_name: out.xml\n",
        )
        .expect("valid config");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
