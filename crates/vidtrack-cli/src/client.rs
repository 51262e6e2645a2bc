//! Shared HTTP client, error type, and server error classification.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use url::Url;
use vidtrack_api::ErrorBody;

use crate::cli::Cli;

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type separating rejected input from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

/// Dependencies constructed from CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
}

impl CliDependencies {
    /// Build the HTTP client tagging every request with `trace_id`.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(trace_id).map_err(|_| {
            CliError::failure(anyhow!("trace identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }
}

/// Context passed to handlers that talk to a server.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Classify a non-success response into a CLI error.
///
/// The server reports failures as `{"error": message}`; anything else falls
/// back to the raw body text.
pub(crate) async fn classify_error(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();
    let body_text = String::from_utf8_lossy(&bytes).trim().to_string();

    let message = serde_json::from_slice::<ErrorBody>(&bytes).map_or(body_text, |body| body.error);

    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE
    ) {
        CliError::validation(message)
    } else if message.is_empty() {
        CliError::failure(anyhow!("request failed with status {status}"))
    } else {
        CliError::failure(anyhow!("{message} (status {status})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::prelude::*;
    use serde_json::json;

    async fn fetch(server: &MockServer) -> Result<reqwest::Response> {
        Ok(Client::new().get(server.url("/upload")).send().await?)
    }

    #[tokio::test]
    async fn bad_request_becomes_validation_error() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/upload");
            then.status(400)
                .json_body(json!({ "error": "Uploaded file is empty" }));
        });

        let err = classify_error(fetch(&server).await?).await;
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(err.display_message(), "Uploaded file is empty");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn server_error_keeps_message_and_status() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/upload");
            then.status(500)
                .json_body(json!({ "error": "No tracking output found" }));
        });

        let err = classify_error(fetch(&server).await?).await;
        assert_eq!(err.exit_code(), 3);
        let message = err.display_message();
        assert!(message.starts_with("No tracking output found"), "{message}");
        assert!(message.contains("500"), "{message}");
        Ok(())
    }

    #[tokio::test]
    async fn plain_text_body_is_used_verbatim() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/upload");
            then.status(413).body("length limit exceeded");
        });

        let err = classify_error(fetch(&server).await?).await;
        assert_eq!(err.display_message(), "length limit exceeded");
        Ok(())
    }

    #[tokio::test]
    async fn empty_body_reports_status() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/upload");
            then.status(502);
        });

        let err = classify_error(fetch(&server).await?).await;
        assert!(err.display_message().contains("502"));
        Ok(())
    }

    #[test]
    fn parse_url_reports_input() {
        let err = parse_url("::nope").err().unwrap_or_default();
        assert!(err.contains("::nope"));
    }
}
