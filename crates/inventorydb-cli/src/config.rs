//! Runtime configuration.
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional
//! TOML file, a `.env` file in the working directory, the process
//! environment. Only the CLI reads configuration; the library crates receive
//! constructed handles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use inventorydb_core::{DEFAULT_DISPLAY_CAP, DEFAULT_QUERY_TIMEOUT_SECS, mask_secret};
use inventorydb_llm::DEFAULT_BASE_URL;
use inventorydb_llm::model::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "inventorydb.toml";
pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_LOG_DIR: &str = "logs";

const KEY_API_KEY: &str = "OPENAI_API_KEY";
const KEY_BASE_URL: &str = "OPENAI_BASE_URL";
const KEY_DATABASE_URL: &str = "DATABASE_URL";
const KEY_MODEL: &str = "INVENTORYDB_MODEL";
const KEY_TEMPERATURE: &str = "INVENTORYDB_TEMPERATURE";
const KEY_DISPLAY_CAP: &str = "INVENTORYDB_DISPLAY_CAP";
const KEY_QUERY_TIMEOUT: &str = "INVENTORYDB_QUERY_TIMEOUT_SECS";
const KEY_LLM_TIMEOUT: &str = "INVENTORYDB_LLM_TIMEOUT_SECS";
const KEY_LOG_DIR: &str = "INVENTORYDB_LOG_DIR";

/// Environment keys read from `.env` and the process environment.
pub const ENV_KEYS: &[&str] = &[
    KEY_API_KEY,
    KEY_BASE_URL,
    KEY_DATABASE_URL,
    KEY_MODEL,
    KEY_TEMPERATURE,
    KEY_DISPLAY_CAP,
    KEY_QUERY_TIMEOUT,
    KEY_LLM_TIMEOUT,
    KEY_LOG_DIR,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Keys accepted in `inventorydb.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub database_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub display_cap: Option<usize>,
    pub query_timeout_secs: Option<u64>,
    pub llm_timeout_secs: Option<u64>,
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, PartialEq)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub database_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub display_cap: usize,
    pub query_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub log_dir: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_BASE_URL.to_string(),
            database_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            display_cap: DEFAULT_DISPLAY_CAP,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            llm_timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl Config {
    /// Resolve every source. An explicit `config_path` must exist; the
    /// default file and `.env` are optional.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let file = match config_path {
            Some(path) => Some(read_config_file(path)?),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Some(read_config_file(path)?)
                } else {
                    None
                }
            }
        };
        if let Some(file) = file {
            config.apply_file(file);
        }

        let dotenv = Path::new(DEFAULT_ENV_FILE);
        if dotenv.exists() {
            config.apply_vars(&load_env_file(dotenv)?)?;
        }

        let process: BTreeMap<String, String> = std::env::vars()
            .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
            .collect();
        config.apply_vars(&process)?;

        config.validate()?;
        Ok(config)
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        let FileConfig {
            openai_api_key,
            openai_base_url,
            database_url,
            model,
            temperature,
            display_cap,
            query_timeout_secs,
            llm_timeout_secs,
            log_dir,
        } = file;

        if let Some(key) = openai_api_key.filter(|key| !key.trim().is_empty()) {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = openai_base_url {
            self.openai_base_url = url;
        }
        if let Some(url) = database_url.filter(|url| !url.trim().is_empty()) {
            self.database_url = Some(url);
        }
        if let Some(model) = model {
            self.model = model;
        }
        if let Some(temperature) = temperature {
            self.temperature = temperature;
        }
        if let Some(cap) = display_cap {
            self.display_cap = cap;
        }
        if let Some(secs) = query_timeout_secs {
            self.query_timeout_secs = secs;
        }
        if let Some(secs) = llm_timeout_secs {
            self.llm_timeout_secs = secs;
        }
        if let Some(dir) = log_dir {
            self.log_dir = dir;
        }
    }

    /// Overlay `KEY=value` pairs. Empty values count as unset.
    pub fn apply_vars(&mut self, vars: &BTreeMap<String, String>) -> Result<(), ConfigError> {
        for (key, value) in vars {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                KEY_API_KEY => self.openai_api_key = Some(value.to_string()),
                KEY_BASE_URL => self.openai_base_url = value.to_string(),
                KEY_DATABASE_URL => self.database_url = Some(value.to_string()),
                KEY_MODEL => self.model = value.to_string(),
                KEY_TEMPERATURE => self.temperature = parse(key, value)?,
                KEY_DISPLAY_CAP => self.display_cap = parse(key, value)?,
                KEY_QUERY_TIMEOUT => self.query_timeout_secs = parse(key, value)?,
                KEY_LLM_TIMEOUT => self.llm_timeout_secs = parse(key, value)?,
                KEY_LOG_DIR => self.log_dir = PathBuf::from(value),
                _ => {}
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, value: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value,
        };
        if self.display_cap == 0 {
            return Err(invalid(KEY_DISPLAY_CAP, "0".to_string()));
        }
        if self.query_timeout_secs == 0 {
            return Err(invalid(KEY_QUERY_TIMEOUT, "0".to_string()));
        }
        if self.llm_timeout_secs == 0 {
            return Err(invalid(KEY_LLM_TIMEOUT, "0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(KEY_TEMPERATURE, self.temperature.to_string()));
        }
        Ok(())
    }

    /// One-line summary safe to log.
    pub fn describe(&self) -> String {
        format!(
            "model={} api_key={} database={} display_cap={} query_timeout={}s",
            self.model,
            self.openai_api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "unset".to_string()),
            if self.database_url.is_some() { "configured" } else { "unset" },
            self.display_cap,
            self.query_timeout_secs
        )
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_env(&content))
}

/// `KEY=value` lines; `#` comments, `export ` prefixes and matching quotes are stripped.
pub fn parse_env(content: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        values.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    values
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.model, "gpt-4.1-nano");
        assert_eq!(config.display_cap, 500);
        assert_eq!(config.query_timeout_secs, 20);
        assert_eq!(config.llm_timeout_secs, 60);
        assert_eq!(config.openai_base_url, "https://api.openai.com/v1");
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn later_sources_win() {
        let mut config = Config::default();
        let file: FileConfig =
            toml::from_str("model = \"gpt-4o\"\ndisplay_cap = 100\nlog_dir = \"/tmp/inv\"\n")
                .expect("valid toml");
        config.apply_file(file);
        config
            .apply_vars(&vars(&[("INVENTORYDB_DISPLAY_CAP", "250")]))
            .expect("valid vars");

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.display_cap, 250);
        assert_eq!(config.log_dir, PathBuf::from("/tmp/inv"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_vars(&vars(&[("OPENAI_API_KEY", "  "), ("DATABASE_URL", "")]))
            .expect("valid vars");
        assert!(config.openai_api_key.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_vars(&vars(&[("INVENTORYDB_QUERY_TIMEOUT_SECS", "soon")]))
            .expect_err("not a number");
        assert_eq!(
            err.to_string(),
            "invalid value for INVENTORYDB_QUERY_TIMEOUT_SECS: 'soon'"
        );

        config.display_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
    }

    #[test]
    fn env_files_strip_quotes_and_exports() {
        let parsed = parse_env(
            "# local settings\nexport OPENAI_API_KEY=\"sk-test\"\nDATABASE_URL='postgres://u:p@h/db'\n\nBROKEN\nINVENTORYDB_MODEL = gpt-4o\n",
        );
        assert_eq!(parsed["OPENAI_API_KEY"], "sk-test");
        assert_eq!(parsed["DATABASE_URL"], "postgres://u:p@h/db");
        assert_eq!(parsed["INVENTORYDB_MODEL"], "gpt-4o");
        assert!(!parsed.contains_key("BROKEN"));
    }

    #[test]
    fn describe_masks_the_key() {
        let mut config = Config::default();
        config.openai_api_key = Some("sk-abcdefghijklmnop".to_string());
        let summary = config.describe();
        assert!(!summary.contains("sk-abcdefghijklmnop"));
        assert!(summary.contains("database=unset"));
    }
}
