//! `vidtrack upload`: post a local video to a running server.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::anyhow;
use reqwest::multipart::{Form, Part};
use url::Url;
use vidtrack_api::UploadResponse;

use crate::cli::{OutputFormat, UploadArgs};
use crate::client::{AppContext, CliError, CliResult, classify_error};
use crate::output::render_upload;

const UPLOAD_FIELD: &str = "file";
const FALLBACK_FILE_NAME: &str = "upload.mp4";

pub(crate) async fn handle_upload(
    ctx: &AppContext,
    args: UploadArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let response = upload_video(ctx, &args.video).await?;
    render_upload(&response, format)
}

async fn upload_video(ctx: &AppContext, video: &Path) -> CliResult<UploadResponse> {
    let bytes = tokio::fs::read(video).await.map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            CliError::validation(format!("video file not found: {}", video.display()))
        }
        _ => CliError::failure(anyhow!("failed to read {}: {err}", video.display())),
    })?;
    let file_name = video.file_name().map_or_else(
        || FALLBACK_FILE_NAME.to_string(),
        |name| name.to_string_lossy().into_owned(),
    );

    let form = Form::new().part(UPLOAD_FIELD, Part::bytes(bytes).file_name(file_name));
    let url = endpoint(&ctx.base_url, "upload")?;

    let response = ctx
        .client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|err| CliError::failure(anyhow!("request to server failed: {err}")))?;

    if !response.status().is_success() {
        return Err(classify_error(response).await);
    }
    response
        .json::<UploadResponse>()
        .await
        .map_err(|err| CliError::failure(anyhow!("failed to decode upload response: {err}")))
}

/// Join `path` under `base`, keeping any path prefix `base` already has.
fn endpoint(base: &Url, path: &str) -> CliResult<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let prefixed = format!("{}/", base.path());
        base.set_path(&prefixed);
    }
    base.join(path)
        .map_err(|err| CliError::failure(anyhow!("invalid {path} URL: {err}")))
}
