//! Startup checks for the external tools the pipeline shells out to.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PipelineError, PipelineResult};

/// Resolve `program` against `PATH`, or verify it when given as a path.
///
/// # Errors
///
/// Returns [`PipelineError::ToolUnavailable`] when the program cannot be found.
pub fn resolve_program(program: &str) -> PipelineResult<PathBuf> {
    let resolved = which::which(program).map_err(|_| PipelineError::ToolUnavailable {
        program: program.to_string(),
        source: None,
    })?;
    info!(program, resolved = %resolved.display(), "external tool resolved");
    Ok(resolved)
}

/// Resolve model weights given as a local path against `base_dir`.
///
/// Bare names (no directory component) are returned unchanged; tools such as
/// the Ultralytics CLI fetch those on first use.
///
/// # Errors
///
/// Returns [`PipelineError::ModelMissing`] when a local path does not exist.
pub fn resolve_model(model: &str, base_dir: &Path) -> PipelineResult<String> {
    let path = Path::new(model);
    if path.components().count() <= 1 {
        return Ok(model.to_string());
    }
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    if !resolved.is_file() {
        return Err(PipelineError::ModelMissing { path: resolved });
    }
    Ok(resolved.to_string_lossy().into_owned())
}
