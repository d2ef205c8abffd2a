//! HTTP endpoint for release webhooks.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::Router;
use pipeline::WebhookDelivery;
use stages::{PipelineExecutor, PipelineOutcome};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub const SIGNATURE_SHA1_HEADER: &str = "x-hub-signature";
pub const SIGNATURE_SHA256_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Body of the liveness response.
pub const HEALTH_BODY: &str = "release-relay";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

/// Collects the parts of a request the pipeline needs.
pub fn delivery_from_parts(headers: &HeaderMap, body: Bytes) -> WebhookDelivery {
    WebhookDelivery {
        body: body.to_vec(),
        signature_sha1: header(headers, SIGNATURE_SHA1_HEADER),
        signature_sha256: header(headers, SIGNATURE_SHA256_HEADER),
        event_name: header(headers, EVENT_HEADER),
        delivery_id: header(headers, DELIVERY_HEADER),
    }
}

/// Maps an outcome to the response status.
///
/// Any non-2xx status makes the sender redeliver, so only failures worth
/// retrying are reported as `503`.
pub fn status_for(outcome: &PipelineOutcome) -> StatusCode {
    match outcome {
        PipelineOutcome::Completed(_) => StatusCode::OK,
        PipelineOutcome::Ignored { .. } | PipelineOutcome::Rejected(_) => StatusCode::FORBIDDEN,
        PipelineOutcome::Aborted { failure, .. } if failure.retry.is_retryable() => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        PipelineOutcome::Aborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn receive(
    State(executor): State<Arc<PipelineExecutor>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let delivery = delivery_from_parts(&headers, body);
    let outcome = executor.handle(&delivery).await;
    let status = status_for(&outcome);
    let summary = outcome.summary();

    match &outcome {
        PipelineOutcome::Completed(_) => info!(status = status.as_u16(), %summary, "Delivery handled"),
        PipelineOutcome::Aborted { .. } => {
            error!(status = status.as_u16(), %summary, "Delivery failed")
        }
        _ => warn!(status = status.as_u16(), %summary, "Delivery refused"),
    }
    (status, summary)
}

async fn health() -> &'static str {
    HEALTH_BODY
}

/// `POST /` handles deliveries; `GET /` answers liveness probes.
pub fn router(executor: Arc<PipelineExecutor>) -> Router {
    Router::new()
        .route("/", get(health).post(receive))
        .with_state(executor)
}

/// Serves the webhook endpoint on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    executor: Arc<PipelineExecutor>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening for webhook deliveries");
    }
    axum::serve(listener, router(executor))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
