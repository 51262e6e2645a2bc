//! Per-route request counting.

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::ApiState;

/// Count each routed request under its route template and final status code.
pub(crate) async fn record_http_metrics(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    let route = request.extensions().get::<MatchedPath>().map_or_else(
        || request.uri().path().to_owned(),
        |matched| matched.as_str().to_owned(),
    );
    let response = next.run(request).await;
    state
        .metrics()
        .inc_http_request(&route, response.status().as_u16());
    response
}
