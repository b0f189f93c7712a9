use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::put,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    config::SchemaKind,
    errors::{PubSubError, Result},
    producer_registry::ProducerRegistry,
};

pub const JSON_ROUTE: &str = "/pubsub/json";
pub const STRING_ROUTE: &str = "/pubsub/string";
pub const NUMBER_ROUTE: &str = "/pubsub/number";

const EMPTY_PAYLOAD: &str = "Failed to read payload or payload is empty";

pub fn route_for(kind: SchemaKind) -> &'static str {
    match kind {
        SchemaKind::Json => JSON_ROUTE,
        SchemaKind::String => STRING_ROUTE,
        SchemaKind::Number => NUMBER_ROUTE,
    }
}

/// One `PUT` route per schema kind, each forwarding to the producer
/// registered for that kind. Request bodies are not size capped.
pub fn router(registry: Arc<ProducerRegistry>) -> Router {
    Router::new()
        .route(JSON_ROUTE, put(publish_json))
        .route(STRING_ROUTE, put(publish_string))
        .route(NUMBER_ROUTE, put(publish_number))
        .with_state(registry)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
}

pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| PubSubError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serves the ingress routes until `shutdown` is cancelled, then lets
/// in-flight requests finish.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<ProducerRegistry>,
    shutdown: CancellationToken,
) -> Result<()> {
    let local_addr = listener.local_addr().map_err(PubSubError::Serve)?;
    info!("Starting producer HTTP server on {}", local_addr);

    for kind in SchemaKind::ALL {
        match registry.entry(kind) {
            Some(entry) => info!(
                route = route_for(kind),
                producer = %entry.name,
                topic = %entry.topic,
                "registered handler: PUT {} -> accepts {} messages",
                route_for(kind),
                kind
            ),
            None => warn!(
                route = route_for(kind),
                "no {} producer configured, PUT {} will answer 503",
                kind,
                route_for(kind)
            ),
        }
    }

    axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(PubSubError::Serve)?;

    info!("producer HTTP server stopped");
    Ok(())
}

async fn publish_json(
    State(registry): State<Arc<ProducerRegistry>>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    if !is_json_content_type(&headers) {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        )
            .into_response();
    }

    let payload = match read_payload(body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    if serde_json::from_slice::<serde_json::Value>(&payload).is_err() {
        return (StatusCode::BAD_REQUEST, "Invalid JSON format").into_response();
    }

    forward(&registry, SchemaKind::Json, payload).await
}

async fn publish_string(
    State(registry): State<Arc<ProducerRegistry>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    match read_payload(body) {
        Ok(payload) => forward(&registry, SchemaKind::String, payload).await,
        Err(response) => response,
    }
}

async fn publish_number(
    State(registry): State<Arc<ProducerRegistry>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let payload = match read_payload(body) {
        Ok(payload) => payload,
        Err(response) => return response,
    };

    if !is_i64(&payload) {
        return (StatusCode::BAD_REQUEST, "Payload must be a valid number").into_response();
    }

    forward(&registry, SchemaKind::Number, payload).await
}

fn read_payload(
    body: std::result::Result<Bytes, BytesRejection>,
) -> std::result::Result<Bytes, Response> {
    match body {
        Ok(payload) if !payload.is_empty() => Ok(payload),
        _ => Err((StatusCode::BAD_REQUEST, EMPTY_PAYLOAD).into_response()),
    }
}

// compares the media type only, parameters such as charset are ignored
fn is_json_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn is_i64(payload: &[u8]) -> bool {
    std::str::from_utf8(payload)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .is_some()
}

async fn forward(registry: &ProducerRegistry, kind: SchemaKind, payload: Bytes) -> Response {
    let Some(entry) = registry.entry(kind) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("No producer registered for schema {}", kind),
        )
            .into_response();
    };

    match entry.handle.send(payload.to_vec()).await {
        Ok(message_id) => {
            info!(
                schema = %kind,
                producer = %entry.name,
                message_id,
                "{} message sent with ID {}",
                kind,
                message_id
            );
            (StatusCode::OK, "Message sent").into_response()
        }
        Err(e) => {
            error!(schema = %kind, producer = %entry.name, error = %e, "failed to send message");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to send message: {}", e),
            )
                .into_response()
        }
    }
}
