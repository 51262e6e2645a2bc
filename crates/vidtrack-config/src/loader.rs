//! Layered configuration loading: defaults, then YAML file, then environment.
//!
//! # Design
//! - The environment is read through an injected lookup so tests never mutate
//!   process state.
//! - Every override is parsed strictly; a malformed value aborts startup.

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DiscoveryMode, LogOutput, ServiceConfig};
use crate::validate::validate;

/// Environment variable naming an optional YAML configuration file.
pub const ENV_CONFIG_PATH: &str = "VIDTRACK_CONFIG";

const ENV_PORT: &str = "VIDTRACK_PORT";
const ENV_BIND_ADDR: &str = "VIDTRACK_BIND_ADDR";
const ENV_BASE_DIR: &str = "VIDTRACK_BASE_DIR";
const ENV_PUBLIC_BASE_URL: &str = "VIDTRACK_PUBLIC_BASE_URL";
const ENV_ALLOWED_ORIGINS: &str = "VIDTRACK_ALLOWED_ORIGINS";
const ENV_MAX_UPLOAD_BYTES: &str = "VIDTRACK_MAX_UPLOAD_BYTES";
const ENV_FFMPEG: &str = "VIDTRACK_FFMPEG";
const ENV_TRACKER_PROGRAM: &str = "VIDTRACK_TRACKER_PROGRAM";
const ENV_MODEL: &str = "VIDTRACK_MODEL";
const ENV_DEVICE: &str = "VIDTRACK_DEVICE";
const ENV_DISCOVERY: &str = "VIDTRACK_DISCOVERY";
const ENV_MAX_JOBS: &str = "VIDTRACK_MAX_CONCURRENT_JOBS";
const ENV_LOG_LEVEL: &str = "VIDTRACK_LOG_LEVEL";
const ENV_LOG_FORMAT: &str = "VIDTRACK_LOG_FORMAT";

type EnvLookup<'a> = Box<dyn Fn(&str) -> Option<String> + Send + Sync + 'a>;

/// Builds a [`ServiceConfig`] from defaults, an optional file, and the environment.
pub struct ConfigLoader<'a> {
    file: Option<PathBuf>,
    env: EnvLookup<'a>,
}

impl ConfigLoader<'static> {
    /// Loader reading overrides from the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::with_env(|name| std::env::var(name).ok())
    }
}

impl<'a> ConfigLoader<'a> {
    /// Loader reading overrides through `env`.
    pub fn with_env(env: impl Fn(&str) -> Option<String> + Send + Sync + 'a) -> Self {
        Self {
            file: None,
            env: Box::new(env),
        }
    }

    /// Use `path` as the YAML file, taking precedence over `VIDTRACK_CONFIG`.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Resolve the layered configuration and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed, an environment
    /// override is malformed, or the merged result fails validation.
    pub fn load(&self) -> ConfigResult<ServiceConfig> {
        let file = self
            .file
            .clone()
            .or_else(|| self.lookup(ENV_CONFIG_PATH).map(PathBuf::from));

        let mut config = match file {
            Some(path) => read_file(&path)?,
            None => ServiceConfig::default(),
        };
        self.apply_env(&mut config)?;
        validate(&config)?;
        Ok(config)
    }

    fn lookup(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|value| !value.trim().is_empty())
    }

    fn apply_env(&self, config: &mut ServiceConfig) -> ConfigResult<()> {
        if let Some(value) = self.lookup(ENV_PORT) {
            config.server.port = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_PORT,
                value,
                reason: "not_a_port",
            })?;
        }
        if let Some(value) = self.lookup(ENV_BIND_ADDR) {
            config.server.bind_addr =
                value
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: ENV_BIND_ADDR,
                        value,
                        reason: "not_an_ip_address",
                    })?;
        }
        if let Some(value) = self.lookup(ENV_BASE_DIR) {
            config.storage.base_dir = PathBuf::from(value);
        }
        if let Some(value) = self.lookup(ENV_PUBLIC_BASE_URL) {
            config.server.public_base_url = value;
        }
        if let Some(value) = self.lookup(ENV_ALLOWED_ORIGINS) {
            config.server.allowed_origins = split_list(&value);
        }
        if let Some(value) = self.lookup(ENV_MAX_UPLOAD_BYTES) {
            config.server.max_upload_bytes =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_MAX_UPLOAD_BYTES,
                    value,
                    reason: "not_an_integer",
                })?;
        }
        if let Some(value) = self.lookup(ENV_FFMPEG) {
            config.transcode.ffmpeg = value;
        }
        if let Some(value) = self.lookup(ENV_TRACKER_PROGRAM) {
            config.inference.program = value;
        }
        if let Some(value) = self.lookup(ENV_MODEL) {
            config.inference.model = value;
        }
        if let Some(value) = self.lookup(ENV_DEVICE) {
            config.inference.device = value;
        }
        if let Some(value) = self.lookup(ENV_DISCOVERY) {
            config.inference.discovery =
                value
                    .parse::<DiscoveryMode>()
                    .map_err(|_| ConfigError::InvalidEnv {
                        name: ENV_DISCOVERY,
                        value,
                        reason: "unknown_mode",
                    })?;
        }
        if let Some(value) = self.lookup(ENV_MAX_JOBS) {
            config.pipeline.max_concurrent_jobs =
                value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    name: ENV_MAX_JOBS,
                    value,
                    reason: "not_an_integer",
                })?;
        }
        if let Some(value) = self.lookup(ENV_LOG_LEVEL) {
            config.logging.level = value;
        }
        if let Some(value) = self.lookup(ENV_LOG_FORMAT) {
            config.logging.format =
                Some(
                    value
                        .parse::<LogOutput>()
                        .map_err(|_| ConfigError::InvalidEnv {
                            name: ENV_LOG_FORMAT,
                            value,
                            reason: "unknown_format",
                        })?,
                );
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> ConfigResult<ServiceConfig> {
    debug!(path = %path.display(), "loading configuration file");
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn loader_with(vars: &[(&str, &str)]) -> ConfigLoader<'static> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        ConfigLoader::with_env(move |name| map.get(name).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() -> Result<(), ConfigError> {
        let config = loader_with(&[]).load()?;
        assert_eq!(config, ServiceConfig::default());
        Ok(())
    }

    #[test]
    fn environment_overrides_apply() -> Result<(), ConfigError> {
        let config = loader_with(&[
            (ENV_PORT, "9001"),
            (ENV_BIND_ADDR, "0.0.0.0"),
            (ENV_ALLOWED_ORIGINS, "http://a.test, http://b.test,,"),
            (ENV_DISCOVERY, "latest"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_FFMPEG, "/opt/ffmpeg/bin/ffmpeg"),
        ])
        .load()?;
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0");
        assert_eq!(
            config.server.allowed_origins,
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(config.inference.discovery, DiscoveryMode::Latest);
        assert_eq!(config.logging.format, Some(LogOutput::Json));
        assert_eq!(config.transcode.ffmpeg, "/opt/ffmpeg/bin/ffmpeg");
        Ok(())
    }

    #[test]
    fn malformed_port_override_is_rejected() {
        let err = loader_with(&[(ENV_PORT, "eighty")]).load().err();
        assert!(matches!(
            err,
            Some(ConfigError::InvalidEnv {
                name: ENV_PORT,
                reason: "not_a_port",
                ..
            })
        ));
    }

    #[test]
    fn blank_override_is_ignored() -> Result<(), ConfigError> {
        let config = loader_with(&[(ENV_DEVICE, "   ")]).load()?;
        assert_eq!(config.inference.device, "cpu");
        Ok(())
    }

    #[test]
    fn split_list_drops_empty_items() {
        assert_eq!(split_list(" a ,b,, "), vec!["a".to_string(), "b".to_string()]);
    }
}
