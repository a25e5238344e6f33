//! Named CLI profiles stored as TOML.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::StrategyArg;

/// Defaults a command applies when its own flags are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub name: String,
    pub default_optional: Option<bool>,
    pub apply_rbac: Option<bool>,
    pub page_limit: Option<u32>,
    pub pagination_strategy: Option<StrategyArg>,
    pub include_hidden: Option<bool>,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
    profiles: BTreeMap<String, Profile>,
}

impl CliConfig {
    /// Reads `explicit`, else the per-user file; a missing file is empty.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_deref() {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path).map_err(io_error("read", path))?;
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            _ => RawConfig::default(),
        };
        let mut config = Self {
            path,
            data,
            profiles: BTreeMap::new(),
        };
        config.reindex()?;
        Ok(config)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_profile_name(&self) -> Option<&str> {
        self.data
            .default_profile
            .as_deref()
            .filter(|name| self.profiles.contains_key(*name))
    }

    /// Profile chosen with `--profile`, else the configured default.
    pub fn active_profile(&self, requested: Option<&str>) -> Result<Option<&Profile>, ConfigError> {
        match requested {
            Some(name) => self.require(name).map(Some),
            None => Ok(self
                .default_profile_name()
                .and_then(|name| self.profiles.get(name))),
        }
    }

    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn set_default_profile(&mut self, name: Option<&str>) -> Result<(), ConfigError> {
        if let Some(name) = name {
            self.require(name)?;
        }
        self.data.default_profile = name.map(str::to_owned);
        Ok(())
    }

    /// Creates `name` or overwrites the settings present in `update`.
    pub fn upsert_profile(&mut self, name: &str, update: ProfileUpdate) -> Result<(), ConfigError> {
        self.data
            .profiles
            .entry(name.to_owned())
            .or_default()
            .merge(update);
        self.reindex()
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.data.profiles.remove(name).is_none() {
            return Err(ConfigError::ProfileNotFound {
                name: name.to_owned(),
            });
        }
        if self.data.default_profile.as_deref() == Some(name) {
            self.data.default_profile = None;
        }
        self.reindex()
    }

    /// Writes the file, creating its directory; returns the path written.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = self
            .path
            .clone()
            .or_else(default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_error("create", parent))?;
        }
        let serialized = toml::to_string_pretty(&self.data)?;
        fs::write(&target, serialized).map_err(io_error("write", &target))?;
        Ok(target)
    }

    fn require(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.to_owned(),
            })
    }

    fn reindex(&mut self) -> Result<(), ConfigError> {
        self.profiles = self
            .data
            .profiles
            .iter()
            .map(|(name, raw)| Ok((name.clone(), raw.validate(name)?)))
            .collect::<Result<_, ConfigError>>()?;
        match &self.data.default_profile {
            Some(name) if !self.profiles.contains_key(name) => Err(ConfigError::ProfileNotFound {
                name: name.clone(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    default_profile: Option<String>,
    #[serde(default)]
    profiles: BTreeMap<String, RawProfile>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    default_optional: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apply_rbac: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pagination_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_hidden: Option<bool>,
}

impl RawProfile {
    fn merge(&mut self, update: ProfileUpdate) {
        self.default_optional = update.default_optional.or(self.default_optional);
        self.apply_rbac = update.apply_rbac.or(self.apply_rbac);
        self.page_limit = update.page_limit.or(self.page_limit);
        if let Some(strategy) = update.pagination_strategy {
            self.pagination_strategy = strategy
                .to_possible_value()
                .map(|value| value.get_name().to_owned());
        }
        self.include_hidden = update.include_hidden.or(self.include_hidden);
    }

    fn validate(&self, name: &str) -> Result<Profile, ConfigError> {
        if self.page_limit == Some(0) {
            return Err(ConfigError::InvalidPageLimit {
                profile: name.to_owned(),
            });
        }
        let pagination_strategy = self
            .pagination_strategy
            .as_deref()
            .map(|value| {
                StrategyArg::from_str(value, true).map_err(|_| ConfigError::InvalidStrategy {
                    profile: name.to_owned(),
                    value: value.to_owned(),
                })
            })
            .transpose()?;
        Ok(Profile {
            name: name.to_owned(),
            default_optional: self.default_optional,
            apply_rbac: self.apply_rbac,
            page_limit: self.page_limit,
            pagination_strategy,
            include_hidden: self.include_hidden,
        })
    }
}

/// Settings to overwrite on a profile; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub default_optional: Option<bool>,
    pub apply_rbac: Option<bool>,
    pub page_limit: Option<u32>,
    pub pagination_strategy: Option<StrategyArg>,
    pub include_hidden: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize CLI config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },
    #[error("profile '{profile}' has unknown pagination_strategy '{value}'")]
    InvalidStrategy { profile: String, value: String },
    #[error("profile '{profile}' page_limit must be greater than zero")]
    InvalidPageLimit { profile: String },
    #[error("no config directory found; pass --config or set QUARRY_CONFIG")]
    NoConfigPath,
}

fn io_error<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> ConfigError + 'a {
    move |source| ConfigError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("quarry").join("cli.toml"))
}
