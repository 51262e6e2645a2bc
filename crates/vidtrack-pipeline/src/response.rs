//! Public URLs for finished outputs.

use url::Url;

use crate::error::{PipelineError, PipelineResult};

/// Builds absolute output URLs from the configured public base.
#[derive(Debug, Clone)]
pub struct ResponseComposer {
    base: Url,
    mount: String,
}

impl ResponseComposer {
    /// Composer joining file names onto `base_url` under `mount`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBaseUrl`] when `base_url` cannot serve as a base.
    pub fn new(base_url: &str, mount: &str) -> PipelineResult<Self> {
        let invalid = || PipelineError::InvalidBaseUrl {
            value: base_url.to_string(),
        };
        let mut base = Url::parse(base_url).map_err(|_| invalid())?;
        if base.cannot_be_a_base() {
            return Err(invalid());
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            mount: mount.trim_matches('/').to_string(),
        })
    }

    /// URL of the output file `file_name`.
    #[must_use]
    pub fn video_url(&self, file_name: &str) -> String {
        let relative = format!("{}/{file_name}", self.mount);
        self.base
            .join(&relative)
            .map_or_else(|_| format!("{}{relative}", self.base), String::from)
    }
}
