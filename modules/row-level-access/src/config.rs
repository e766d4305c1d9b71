//! Settings and the `rla.yml` rule file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_RULES_FILE: &str = "rla.yml";
pub const ENV_PREFIX: &str = "RLA_";

/// Where rules are read from and which rule type applies when a
/// definition names none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RlaSettings {
    /// Directory holding the rules file.
    pub config_dir: PathBuf,

    /// Rules file name, relative to `config_dir`.
    pub rules_file: String,

    /// Application-wide default rule type.
    pub default_type: Option<String>,
}

impl Default for RlaSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            rules_file: DEFAULT_RULES_FILE.to_owned(),
            default_type: None,
        }
    }
}

impl RlaSettings {
    /// Layer defaults, the optional settings file and `RLA_*` environment
    /// variables, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Unreadable`] if `settings_file` does not exist
    /// and [`ConfigError::Settings`] if the merged settings do not extract.
    pub fn load(settings_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = settings_file {
            if !path.is_file() {
                return Err(ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).only(&[
            "config_dir",
            "rules_file",
            "default_type",
        ]));
        Self::from_figment(&figment)
    }

    /// Extract settings from an already assembled figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Settings`] on missing or mistyped values.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(|e| ConfigError::Settings(Box::new(e)))
    }

    /// Full path of the rules file.
    #[must_use]
    pub fn rules_path(&self) -> PathBuf {
        self.config_dir.join(&self.rules_file)
    }
}

/// One model entry of the rules file: an optional `type` and the options
/// handed to that type's factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,

    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl RuleDefinition {
    #[must_use]
    pub fn new(rule_type: Option<&str>) -> Self {
        Self {
            rule_type: rule_type.map(str::to_owned),
            options: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_option(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.options.insert(key.to_owned(), value.into());
        self
    }
}

/// Rule definitions keyed by model class name.
pub type RuleDefinitions = BTreeMap<String, RuleDefinition>;

/// Read and parse a rules file.
///
/// An empty file (or one holding only comments) is an empty rule set. A
/// model listed without options gets an empty definition.
///
/// # Errors
///
/// Returns [`ConfigError::Unreadable`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not a map of model names to definitions.
pub fn load_configuration(path: &Path) -> Result<RuleDefinitions, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_configuration(&content).map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_configuration(content: &str) -> Result<RuleDefinitions, String> {
    let blank = content.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    });
    if blank {
        return Ok(RuleDefinitions::new());
    }
    let parsed: Option<BTreeMap<String, Option<RuleDefinition>>> =
        serde_saphyr::from_str(content).map_err(|e| e.to_string())?;
    Ok(parsed
        .unwrap_or_default()
        .into_iter()
        .map(|(model, definition)| (model, definition.unwrap_or_default()))
        .collect())
}
