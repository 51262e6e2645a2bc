//! Temporary service layout and scripted tracker commands.

use std::path::Path;

use tempfile::TempDir;
use vidtrack_config::{InferenceConfig, ServiceConfig};

/// Behaviour of the scripted tracker installed by [`fake_tracker_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeTracker {
    /// Logs two frame lines and writes an annotated copy into its run directory.
    WritesVideo,
    /// Creates the run directory with a label file but no video.
    WritesNoVideo,
    /// Exits successfully without creating anything.
    WritesNothing,
    /// Writes a diagnostic to stderr and exits non-zero.
    Fails,
    /// Mimics Ultralytics run naming: saves `<source stem>.avi` into
    /// `<project>/<name>`, picking `<name>2`, `<name>3`, ... for each new run
    /// unless `exist_ok=True` is passed.
    AutoNumbered,
}

impl FakeTracker {
    const fn script(self) -> &'static str {
        match self {
            Self::WritesVideo => {
                "mkdir -p \"$1/$2\" && \
                 echo \"video 1/1 (frame 1/2) 640x480 1 person\" >&2 && \
                 echo \"video 1/1 (frame 2/2) 640x480 1 person\" >&2 && \
                 cp \"$3\" \"$1/$2/annotated.avi\""
            }
            Self::WritesNoVideo => {
                "mkdir -p \"$1/$2/labels\" && echo 0 > \"$1/$2/labels/frame.txt\""
            }
            Self::WritesNothing => "echo \"nothing to do\"",
            Self::Fails => "echo \"CUDA device unavailable\" >&2; exit 1",
            Self::AutoNumbered => {
                "dir=\"$1/$2\"; \
                 if [ \"$4\" != \"exist_ok=True\" ]; then \
                     n=2; while [ -e \"$dir\" ]; do dir=\"$1/$2$n\"; n=$((n+1)); done; \
                 fi; \
                 mkdir -p \"$dir\" && stem=$(basename \"$3\") && \
                 echo \"video 1/1 (frame 1/1) 640x480 1 car\" >&2 && \
                 cp \"$3\" \"$dir/${stem%.*}.avi\""
            }
        }
    }
}

/// Point `config` at a `sh`-based tracker that behaves as `behavior`.
pub fn fake_tracker_config(config: &mut InferenceConfig, behavior: FakeTracker) {
    config.program = "sh".to_string();
    config.args = vec![
        "-c".to_string(),
        behavior.script().to_string(),
        "sh".to_string(),
        "{project}".to_string(),
        "{name}".to_string(),
        "{source}".to_string(),
        "exist_ok={exist_ok}".to_string(),
    ];
    config.model = "yolov8n.pt".to_string();
}

/// Temporary directory with a service configuration rooted inside it.
pub struct TestWorkspace {
    temp: TempDir,
    config: ServiceConfig,
}

impl TestWorkspace {
    /// Fresh workspace using the scripted tracker in `behavior`.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new(behavior: FakeTracker) -> anyhow::Result<Self> {
        let temp = tempfile::tempdir()?;
        let mut config = ServiceConfig::default();
        config.storage.base_dir = temp.path().to_path_buf();
        fake_tracker_config(&mut config.inference, behavior);
        Ok(Self { temp, config })
    }

    /// Root of the workspace.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Configuration rooted in the workspace.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Mutable configuration for per-test adjustments.
    pub const fn config_mut(&mut self) -> &mut ServiceConfig {
        &mut self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_config_is_rooted_in_tempdir() -> anyhow::Result<()> {
        let workspace = TestWorkspace::new(FakeTracker::WritesVideo)?;
        assert_eq!(workspace.config().storage.base_dir, workspace.root());
        assert_eq!(workspace.config().inference.program, "sh");
        assert!(
            workspace
                .config()
                .inference
                .args
                .iter()
                .any(|arg| arg == "{name}")
        );
        Ok(())
    }

    #[test]
    fn config_mut_applies_changes() -> anyhow::Result<()> {
        let mut workspace = TestWorkspace::new(FakeTracker::Fails)?;
        workspace.config_mut().pipeline.max_concurrent_jobs = 3;
        assert_eq!(workspace.config().pipeline.max_concurrent_jobs, 3);
        Ok(())
    }
}
