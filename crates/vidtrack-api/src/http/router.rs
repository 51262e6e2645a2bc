//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request},
    middleware,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{Span, info};
use vidtrack_config::ServiceConfig;
use vidtrack_pipeline::Pipeline;
use vidtrack_telemetry::build_sha;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::constants::HEADER_REQUEST_ID;
use crate::http::health::{health, metrics};
use crate::http::telemetry::record_http_metrics;
use crate::http::upload::upload;
use crate::state::ApiState;

/// Axum router wrapper that hosts the vidtrack HTTP surface.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around a ready pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::InvalidOrigin`] when a configured CORS origin
    /// is not a valid header value.
    pub fn new(config: &ServiceConfig, pipeline: Pipeline) -> ApiServerResult<Self> {
        let origins = config
            .server
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim_end_matches('/')).map_err(|_| {
                    ApiServerError::InvalidOrigin {
                        origin: origin.clone(),
                    }
                })
            })
            .collect::<ApiServerResult<Vec<_>>>()?;
        let cors_layer = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any);

        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(HEADER_REQUEST_ID)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_request(|_request: &Request<_>, _span: &Span| {})
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );

        let outputs = ServeDir::new(pipeline.layout().outputs_dir());
        let mount = format!("/{}", config.storage.outputs_mount.trim_matches('/'));
        let state = Arc::new(ApiState::new(pipeline));

        let layered = ServiceBuilder::new()
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(trace_layer)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                record_http_metrics,
            ));

        let router = Router::new()
            .route("/upload", post(upload))
            .route("/health", get(health))
            .route("/metrics", get(metrics))
            .nest_service(&mount, outputs)
            .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);

        Ok(Self { router })
    }

    /// Router for in-process use.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Bind to `addr` and serve until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener fails to bind or the server terminates unexpectedly.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(%addr, "vidtrack api listening");
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}
