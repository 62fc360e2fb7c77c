use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use load_breaker::{BreakerError, CircuitBreaker};
use serde_json::{Value, json};
use tracing::debug;

#[derive(Clone)]
pub struct HttpState {
    pub breaker: CircuitBreaker,
}

pub fn router(breaker: CircuitBreaker) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .route("/trip-breaker", get(trip_breaker).post(trip_breaker))
        .route("/status", get(status))
        .route("/reset", post(reset))
        .route("/cap-reset", post(cap_reset))
        .with_state(HttpState { breaker })
}

fn status_body(breaker: &CircuitBreaker) -> Value {
    let snapshot = breaker.snapshot();
    json!({
        "name": breaker.name(),
        "state": snapshot.state.as_str(),
        "open": snapshot.state != load_breaker::BreakerState::Closed,
        "capped": snapshot.state == load_breaker::BreakerState::Capped,
        "counter": snapshot.counter,
        "trip_counter": snapshot.trip_counter,
        "pending_decrements": snapshot.pending_decrements,
    })
}

fn conflict(err: BreakerError) -> (StatusCode, Json<Value>) {
    (StatusCode::CONFLICT, Json(json!({ "error": err.to_string() })))
}

// ----------------------
// Handlers
// ----------------------
pub async fn index() -> &'static str {
    "Hello, world!"
}

pub async fn ping(State(state): State<HttpState>) -> (StatusCode, &'static str) {
    if state.breaker.is_open() {
        return (StatusCode::SERVICE_UNAVAILABLE, "Breaker open");
    }
    (StatusCode::OK, "Pong")
}

/// Drive the breaker to its threshold in one request
pub async fn trip_breaker(State(state): State<HttpState>) -> (StatusCode, Json<Value>) {
    let breaker = &state.breaker;
    for _ in 0..breaker.config().upper_threshold {
        if let Err(e) = breaker.increment() {
            debug!(error = %e, "ignoring increment on open breaker");
        }
    }
    (StatusCode::OK, Json(status_body(breaker)))
}

pub async fn status(State(state): State<HttpState>) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(status_body(&state.breaker)))
}

pub async fn reset(State(state): State<HttpState>) -> (StatusCode, Json<Value>) {
    match state.breaker.reset() {
        Ok(()) => (StatusCode::OK, Json(status_body(&state.breaker))),
        Err(e) => conflict(e),
    }
}

pub async fn cap_reset(State(state): State<HttpState>) -> (StatusCode, Json<Value>) {
    state.breaker.cap_reset();
    (StatusCode::OK, Json(status_body(&state.breaker)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use load_breaker::ManualScheduler;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn breaker_on_clock(trip_threshold: usize) -> (CircuitBreaker, Arc<ManualScheduler>) {
        let clock = Arc::new(ManualScheduler::new());
        let breaker = CircuitBreaker::builder("demo")
            .upper_threshold(5)
            .decrement_duration(Duration::from_millis(1000))
            .cooloff_duration(Duration::from_millis(5000))
            .trip_threshold(trip_threshold)
            .scheduler(clock.clone())
            .build();
        (breaker, clock)
    }

    async fn send(router: &Router, method: Method, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send_json(router: &Router, method: Method, path: &str) -> (StatusCode, Value) {
        let (status, body) = send(router, method, path).await;
        (status, serde_json::from_str(&body).unwrap())
    }

    #[tokio::test]
    async fn test_index_greets() {
        let (breaker, _clock) = breaker_on_clock(0);
        let router = router(breaker);

        let (status, body) = send(&router, Method::GET, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Hello, world!");
    }

    #[tokio::test]
    async fn test_ping_follows_breaker_state() {
        let (breaker, clock) = breaker_on_clock(0);
        let router = router(breaker.clone());

        let (status, body) = send(&router, Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Pong");

        let (status, json) = send_json(&router, Method::GET, "/trip-breaker").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["open"], true);
        assert_eq!(json["counter"], 5);
        assert_eq!(json["trip_counter"], 1);

        let (status, _) = send(&router, Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        clock.advance(Duration::from_millis(5000));
        let (status, _) = send(&router, Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert!(breaker.is_closed());
    }

    #[tokio::test]
    async fn test_trip_breaker_on_open_breaker_is_ignored() {
        let (breaker, _clock) = breaker_on_clock(0);
        let router = router(breaker.clone());

        send(&router, Method::POST, "/trip-breaker").await;
        let (status, json) = send_json(&router, Method::POST, "/trip-breaker").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "Open");
        assert_eq!(json["trip_counter"], 1);
    }

    #[tokio::test]
    async fn test_status_reports_snapshot() {
        let (breaker, _clock) = breaker_on_clock(0);
        breaker.increment().unwrap();
        breaker.increment().unwrap();
        let router = router(breaker);

        let (status, json) = send_json(&router, Method::GET, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "demo");
        assert_eq!(json["state"], "Closed");
        assert_eq!(json["open"], false);
        assert_eq!(json["capped"], false);
        assert_eq!(json["counter"], 2);
        assert_eq!(json["pending_decrements"], 2);
    }

    #[tokio::test]
    async fn test_reset_endpoint() {
        let (breaker, _clock) = breaker_on_clock(0);
        let router = router(breaker.clone());

        let (status, json) = send_json(&router, Method::POST, "/reset").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(json["error"].as_str().unwrap().contains("cannot reset"));

        send(&router, Method::POST, "/trip-breaker").await;
        let (status, json) = send_json(&router, Method::POST, "/reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "Closed");
        assert_eq!(json["counter"], 0);
    }

    #[tokio::test]
    async fn test_capped_breaker_needs_cap_reset() {
        let (breaker, clock) = breaker_on_clock(1);
        let router = router(breaker);

        let (_, json) = send_json(&router, Method::GET, "/trip-breaker").await;
        assert_eq!(json["capped"], true);

        clock.advance(Duration::from_secs(60));
        let (status, _) = send(&router, Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = send(&router, Method::POST, "/reset").await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, json) = send_json(&router, Method::POST, "/cap-reset").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["state"], "Closed");
        assert_eq!(json["trip_counter"], 0);

        let (status, _) = send(&router, Method::GET, "/ping").await;
        assert_eq!(status, StatusCode::OK);
    }
}
