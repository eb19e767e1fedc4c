use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Correlation id carried through request extensions and echoed on the
/// response.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Correlation-id injection middleware: honor `x-correlation-id` when the
/// caller sends one, mint a UUID otherwise.
pub async fn correlation_id(mut request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request.extensions_mut().insert(CorrelationId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = id.parse() {
        response.headers_mut().insert("x-correlation-id", value);
    }
    response
}

/// Request logging middleware with latency and status.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        latency_ms = start.elapsed().as_millis() as u64,
        correlation_id = %correlation_id,
        "request completed"
    );
    response
}
