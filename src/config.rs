//! Configuration schema for glint.
//!
//! Configuration is a YAML file (`.glint.yml` by default) selecting rules,
//! overriding their severities and options, and controlling the cache and
//! output.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::rule::Severity;

/// File names searched for, in order, when no config path is given.
pub const CONFIG_FILE_NAMES: &[&str] = &[".glint.yml", ".glint.yaml", "glint.yml", "glint.yaml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid excluded_paths pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid option {rule}.{key}: {source}")]
    InvalidOption {
        rule: String,
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Run every registered rule unless its entry disables it (default: true).
    #[serde(default = "default_true")]
    pub enable_all: bool,
    /// Maximum concurrent file analyses; zero or negative uses every CPU.
    #[serde(default)]
    pub concurrency: i64,
    /// Whether to analyze `_test.go` files (default: false)
    #[serde(default)]
    pub include_test_files: Option<bool>,
    /// Glob patterns for paths to exclude from analysis (e.g., "**/gen/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Per-rule settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RuleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_all: true,
            concurrency: 0,
            include_test_files: None,
            excluded_paths: Vec::new(),
            rules: BTreeMap::new(),
            cache: CacheConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cache directory; `~` expands to the home directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

/// Report format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Find and parse the first config file in `dir`.
    pub fn discover(dir: &Path) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        for name in CONFIG_FILE_NAMES {
            let path = dir.join(name);
            if path.is_file() {
                let config = Self::parse_file(&path)?;
                return Ok(Some((path, config)));
            }
        }
        Ok(None)
    }

    /// Check that every pattern compiles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.excluded_matcher().map(|_| ())
    }

    /// A config enabling exactly `rules`, as written by `glint init`.
    pub fn with_rules<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enable_all: false,
            rules: rules
                .into_iter()
                .map(|name| {
                    (
                        name.into(),
                        RuleConfig {
                            enabled: Some(true),
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Whether a rule is selected: an explicit `enabled` wins, otherwise
    /// `enable_all`. `--enable-all` only changes the fallback, so a rule
    /// disabled by name stays disabled.
    pub fn is_rule_active(&self, name: &str) -> bool {
        self.rules
            .get(name)
            .and_then(|r| r.enabled)
            .unwrap_or(self.enable_all)
    }

    pub fn severity_override(&self, name: &str) -> Option<Severity> {
        self.rules.get(name).and_then(|r| r.severity)
    }

    /// Typed value of `rules.<rule>.options.<key>`, if present.
    pub fn rule_option<T: DeserializeOwned>(
        &self,
        rule: &str,
        key: &str,
    ) -> Result<Option<T>, ConfigError> {
        let Some(value) = self.rules.get(rule).and_then(|r| r.options.get(key)) else {
            return Ok(None);
        };
        serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|source| ConfigError::InvalidOption {
                rule: rule.to_string(),
                key: key.to_string(),
                source,
            })
    }

    /// Returns whether to include test files (defaults to false).
    pub fn should_include_test_files(&self) -> bool {
        self.include_test_files.unwrap_or(false)
    }

    /// Configured concurrency limit; zero selects the default.
    pub fn concurrency_limit(&self) -> usize {
        usize::try_from(self.concurrency).unwrap_or(0)
    }

    /// Compiled `excluded_paths` patterns.
    pub fn excluded_matcher(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::InvalidPattern {
            pattern: self.excluded_paths.join(", "),
            source,
        })
    }

    /// Cache directory after `~` expansion; `None` selects the default location.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        let dir = self.cache.dir.as_ref()?;
        let Ok(rest) = dir.strip_prefix("~") else {
            return Some(dir.clone());
        };
        let home = directories::BaseDirs::new()?.home_dir().to_path_buf();
        Some(home.join(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
enable_all: false
concurrency: 4
rules:
  unchecked-error:
    enabled: true
    severity: warn
  line-length:
    enabled: true
    options:
      max: 100
  naming-convention:
    enabled: false
cache:
  enabled: false
output:
  format: sarif
  color: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_rule_active("unchecked-error"));
        assert!(!config.is_rule_active("naming-convention"));
        assert!(!config.is_rule_active("nil-deref"));
        assert_eq!(
            config.severity_override("unchecked-error"),
            Some(Severity::Warning)
        );
        assert_eq!(config.rule_option::<usize>("line-length", "max").unwrap(), Some(100));
        assert_eq!(config.concurrency_limit(), 4);
        assert!(!config.cache.enabled);
        assert_eq!(config.output.format, OutputFormat::Sarif);
        assert!(!config.output.color);
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(config.enable_all);
        assert!(config.is_rule_active("nil-deref"));
        assert!(config.cache.enabled);
        assert!(config.output.color);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(!config.should_include_test_files());
    }

    #[test]
    fn test_enable_all_with_explicit_disable() {
        let yaml = "enable_all: true\nrules:\n  line-length:\n    enabled: false\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.is_rule_active("nil-deref"));
        assert!(!config.is_rule_active("line-length"));
    }

    #[test]
    fn test_negative_concurrency_uses_default() {
        let config: Config = serde_yaml::from_str("concurrency: -1").unwrap();
        assert_eq!(config.concurrency_limit(), 0);
    }

    #[test]
    fn test_invalid_option_type() {
        let yaml = "rules:\n  line-length:\n    options:\n      max: wide\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.rule_option::<usize>("line-length", "max").is_err());
    }

    #[test]
    fn test_excluded_matcher() {
        let config = Config {
            excluded_paths: vec!["**/gen/**".to_string()],
            ..Default::default()
        };
        let matcher = config.excluded_matcher().unwrap();
        assert!(matcher.is_match("pkg/gen/types.go"));
        assert!(!matcher.is_match("pkg/api/types.go"));

        let bad = Config {
            excluded_paths: vec!["[".to_string()],
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_discover_and_roundtrip() {
        let temp = TempDir::new().unwrap();
        assert!(Config::discover(temp.path()).unwrap().is_none());

        let config = Config::with_rules(["line-length", "nil-deref"]);
        fs::write(temp.path().join(".glint.yml"), config.to_yaml().unwrap()).unwrap();

        let (path, loaded) = Config::discover(temp.path()).unwrap().unwrap();
        assert!(path.ends_with(".glint.yml"));
        assert!(loaded.is_rule_active("line-length"));
        assert!(!loaded.is_rule_active("sql-injection"));
    }

    #[test]
    fn test_cache_dir_expansion() {
        let config = Config {
            cache: CacheConfig {
                enabled: true,
                dir: Some(PathBuf::from("/var/cache/glint")),
            },
            ..Default::default()
        };
        assert_eq!(config.cache_dir(), Some(PathBuf::from("/var/cache/glint")));
        assert!(Config::default().cache_dir().is_none());
    }
}
