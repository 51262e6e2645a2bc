//! Locating the run directory and annotated video a tracker produced.
//!
//! # Design
//! - Token lookups are exact; the latest-modified heuristic exists for tools that
//!   pick their own run suffix and is only safe with one job in flight.
//! - Traversal order is fixed (sorted by name) so repeated lookups agree.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};

/// How to pick the run directory for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSelector {
    /// The run directory has exactly this name.
    Token(String),
    /// The most recently modified directory carrying the prefix.
    Latest,
}

impl RunSelector {
    fn describe(&self) -> String {
        match self {
            Self::Token(name) => format!("token:{name}"),
            Self::Latest => "latest".to_string(),
        }
    }
}

/// Run directory selected for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    /// Directory path.
    pub path: PathBuf,
    /// Directory name.
    pub name: String,
}

/// Video file found inside a run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducedArtifact {
    /// File path.
    pub path: PathBuf,
}

/// Select the run directory under `scratch`.
///
/// # Errors
///
/// Returns [`PipelineError::NoRunFound`] when nothing matches, and
/// [`PipelineError::Io`] when the scratch base cannot be listed.
pub fn locate_run(
    scratch: &Path,
    prefix: &str,
    selector: &RunSelector,
) -> PipelineResult<RunDirectory> {
    let not_found = || PipelineError::NoRunFound {
        scratch: scratch.to_path_buf(),
        selector: selector.describe(),
    };

    match selector {
        RunSelector::Token(name) => {
            let path = scratch.join(name);
            if path.is_dir() {
                Ok(RunDirectory {
                    path,
                    name: name.clone(),
                })
            } else {
                Err(not_found())
            }
        }
        RunSelector::Latest => {
            if !scratch.is_dir() {
                return Err(not_found());
            }
            let entries = fs::read_dir(scratch)
                .map_err(|source| PipelineError::io("locator.read_scratch", scratch, source))?;

            let mut best: Option<(SystemTime, String, PathBuf)> = None;
            for entry in entries {
                let entry = entry
                    .map_err(|source| PipelineError::io("locator.read_entry", scratch, source))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with(prefix) {
                    continue;
                }
                let metadata = entry.metadata().map_err(|source| {
                    PipelineError::io("locator.metadata", entry.path(), source)
                })?;
                if !metadata.is_dir() {
                    continue;
                }
                let modified = metadata.modified().map_err(|source| {
                    PipelineError::io("locator.modified", entry.path(), source)
                })?;
                let newer = best.as_ref().is_none_or(|(best_time, best_name, _)| {
                    (modified, name.as_str()) > (*best_time, best_name.as_str())
                });
                if newer {
                    best = Some((modified, name, entry.path()));
                }
            }

            let (_, name, path) = best.ok_or_else(not_found)?;
            debug!(run = %name, "selected latest run directory");
            Ok(RunDirectory { path, name })
        }
    }
}

/// Find the first video under `run_dir` whose extension is in `extensions`.
///
/// # Errors
///
/// Returns [`PipelineError::ArtifactNotFound`] when no file matches and
/// [`PipelineError::Walkdir`] when traversal fails.
pub fn find_artifact(run_dir: &Path, extensions: &[String]) -> PipelineResult<ProducedArtifact> {
    for entry in WalkDir::new(run_dir).sort_by_file_name() {
        let entry =
            entry.map_err(|source| PipelineError::walkdir("locator.walk", run_dir, source))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let matches = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        if matches {
            return Ok(ProducedArtifact {
                path: entry.into_path(),
            });
        }
    }
    Err(PipelineError::ArtifactNotFound {
        run_dir: run_dir.to_path_buf(),
    })
}
