//! Post-load validation of the merged configuration.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DiscoveryMode, ServiceConfig};

/// Placeholders the tracker template must reference so the run lands where it is looked up.
const REQUIRED_PLACEHOLDERS: &[&str] = &["{source}", "{project}"];

/// Validate cross-field invariants of a merged configuration.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first violated invariant.
pub fn validate(config: &ServiceConfig) -> ConfigResult<()> {
    if config.server.port == 0 {
        return Err(ConfigError::invalid_field(
            "server",
            "port",
            Some("0".to_string()),
            "zero",
        ));
    }
    validate_base_url(&config.server.public_base_url)?;
    if config.server.max_upload_bytes == 0 {
        return Err(ConfigError::invalid_field(
            "server",
            "max_upload_bytes",
            Some("0".to_string()),
            "zero",
        ));
    }
    for origin in &config.server.allowed_origins {
        if Url::parse(origin).is_err() {
            return Err(ConfigError::invalid_field(
                "server",
                "allowed_origins",
                Some(origin.clone()),
                "not_a_url",
            ));
        }
    }

    if config.storage.artifact_extensions.is_empty() {
        return Err(ConfigError::invalid_field(
            "storage",
            "artifact_extensions",
            None,
            "empty",
        ));
    }
    if config.storage.container_extension.trim().is_empty() {
        return Err(ConfigError::invalid_field(
            "storage",
            "container_extension",
            None,
            "empty",
        ));
    }
    if config.storage.outputs_mount.trim_matches('/').is_empty() {
        return Err(ConfigError::invalid_field(
            "storage",
            "outputs_mount",
            Some(config.storage.outputs_mount.clone()),
            "empty",
        ));
    }

    if config.inference.program.trim().is_empty() {
        return Err(ConfigError::invalid_field(
            "inference",
            "program",
            None,
            "empty",
        ));
    }
    if config.inference.run_prefix.trim().is_empty() {
        return Err(ConfigError::invalid_field(
            "inference",
            "run_prefix",
            None,
            "empty",
        ));
    }
    for placeholder in REQUIRED_PLACEHOLDERS {
        if !config
            .inference
            .args
            .iter()
            .any(|arg| arg.contains(placeholder))
        {
            return Err(ConfigError::invalid_field(
                "inference",
                "args",
                Some((*placeholder).to_string()),
                "missing_placeholder",
            ));
        }
    }
    if config.inference.discovery == DiscoveryMode::Token
        && !config.inference.args.iter().any(|arg| arg.contains("{name}"))
    {
        return Err(ConfigError::invalid_field(
            "inference",
            "args",
            Some("{name}".to_string()),
            "token_discovery_requires_name",
        ));
    }
    if config.inference.discovery == DiscoveryMode::Latest
        && let Some(arg) = config
            .inference
            .args
            .iter()
            .find(|arg| arg.to_ascii_lowercase().contains("exist_ok=true"))
    {
        return Err(ConfigError::invalid_field(
            "inference",
            "args",
            Some(arg.clone()),
            "latest_discovery_reuses_run",
        ));
    }

    if config.transcode.ffmpeg.trim().is_empty() {
        return Err(ConfigError::invalid_field(
            "transcode",
            "ffmpeg",
            None,
            "empty",
        ));
    }

    match config.pipeline.max_concurrent_jobs {
        0 => Err(ConfigError::invalid_field(
            "pipeline",
            "max_concurrent_jobs",
            Some("0".to_string()),
            "zero",
        )),
        1 => Ok(()),
        jobs if config.inference.discovery == DiscoveryMode::Latest => {
            Err(ConfigError::invalid_field(
                "pipeline",
                "max_concurrent_jobs",
                Some(jobs.to_string()),
                "latest_discovery_requires_single_job",
            ))
        }
        _ => Ok(()),
    }
}

fn validate_base_url(raw: &str) -> ConfigResult<()> {
    let url = Url::parse(raw).map_err(|_| {
        ConfigError::invalid_field(
            "server",
            "public_base_url",
            Some(raw.to_string()),
            "not_a_url",
        )
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_field(
            "server",
            "public_base_url",
            Some(raw.to_string()),
            "not_absolute_http",
        ));
    }
    Ok(())
}
