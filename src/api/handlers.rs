//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, VerifyQuery, WebhookResponse};
use super::AppState;
use crate::channel::{parse_webhook, verify_signature, SIGNATURE_HEADER};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat platform webhook
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Subscription handshake: echo the challenge when the token matches
async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, AppError> {
    let subscribed = query.mode.as_deref() == Some("subscribe");
    let token_ok = query.verify_token.as_deref() == Some(state.verify_token.as_str());

    match query.challenge {
        Some(challenge) if subscribed && token_ok => {
            tracing::info!("Webhook verified");
            Ok(challenge)
        }
        _ => {
            tracing::warn!(mode = ?query.mode, "Webhook verification rejected");
            Err(AppError::Forbidden("Webhook verification failed".to_string()))
        }
    }
}

/// Accept a signed notification and queue its text messages.
///
/// The signature is checked over the raw body before anything is parsed.
/// Answers as soon as messages are queued; replies go out asynchronously.
/// When any message could not be queued the platform is told to retry, and
/// the already-queued ones are dropped as duplicates on redelivery.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if signature.is_empty() {
        tracing::warn!("Webhook delivery without signature");
        return Err(AppError::Unauthorized("Missing webhook signature".to_string()));
    }
    if !verify_signature(&state.app_secret, &body, signature) {
        tracing::warn!("Webhook signature mismatch");
        return Err(AppError::Forbidden("Invalid webhook signature".to_string()));
    }

    let messages = parse_webhook(&body).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut response = WebhookResponse {
        queued: 0,
        duplicates: 0,
    };
    let mut rejected = None;

    for message in messages {
        if !state.recent.insert(&message.id) {
            tracing::debug!(message_id = %message.id, "Dropping redelivered message");
            response.duplicates += 1;
            continue;
        }

        let id = message.id.clone();
        match state.queues.enqueue(message) {
            Ok(()) => response.queued += 1,
            Err(e) => {
                state.recent.forget(&id);
                rejected = Some(e);
            }
        }
    }

    match rejected {
        None => Ok(Json(response)),
        Some(e) => Err(AppError::Unavailable(e.to_string())),
    }
}

// ============================================================
// Status
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        app: state.app_name.clone(),
        client_id: state.client_id.clone(),
        active_senders: state.queues.active_senders(),
    })
}

async fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Unavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecentMessageIds;
    use crate::runtime::testing::RecordingHandler;
    use crate::runtime::SenderQueues;
    use axum::body::Body;
    use axum::http::Request;
    use hmac::{Hmac, Mac};
    use serde_json::{json, Value};
    use sha2::Sha256;
    use std::sync::Arc;
    use tower::ServiceExt;

    const APP_SECRET: &str = "app-secret";

    fn test_state() -> (AppState, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::new());
        let state = AppState {
            queues: SenderQueues::new(handler.clone()),
            recent: Arc::new(RecentMessageIds::new(16)),
            verify_token: "verify".to_string(),
            app_secret: APP_SECRET.to_string(),
            app_name: "test-gateway".to_string(),
            client_id: "test".to_string(),
        };
        (state, handler)
    }

    fn notification(id: &str, from: &str, body: &str) -> Value {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "changes": [{
                    "value": {
                        "messages": [{
                            "from": from,
                            "id": id,
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": { "body": body }
                        }]
                    }
                }]
            }]
        })
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn post_signed_by(secret: &str, value: &Value) -> Request<Body> {
        let body = value.to_string();
        Request::post("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, sign(secret, body.as_bytes()))
            .body(Body::from(body))
            .unwrap()
    }

    fn post_json(value: &Value) -> Request<Body> {
        post_signed_by(APP_SECRET, value)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_verify_webhook() {
        let (state, _) = test_state();
        let app = create_router(state);

        let ok = app
            .clone()
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=verify&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(ok.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"42");

        let denied = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_receive_queues_and_dedupes() {
        let (state, handler) = test_state();
        let queues = state.queues.clone();
        let app = create_router(state);
        let payload = notification("wamid.1", "6281234", "!start.ai");

        let first = app.clone().oneshot(post_json(&payload)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(body_json(first).await, json!({ "queued": 1, "duplicates": 0 }));

        let again = app.oneshot(post_json(&payload)).await.unwrap();
        assert_eq!(body_json(again).await, json!({ "queued": 0, "duplicates": 1 }));

        queues.shutdown().await;
        let handled = handler.handled();
        assert_eq!(handled.len(), 1);
        assert_eq!(handled[0].from, "6281234");
        assert_eq!(handled[0].body, "!start.ai");
    }

    #[tokio::test]
    async fn test_receive_during_shutdown_asks_for_retry() {
        let (state, _) = test_state();
        let queues = state.queues.clone();
        let recent = state.recent.clone();
        let app = create_router(state);
        queues.shutdown().await;

        let response = app
            .oneshot(post_json(&notification("wamid.9", "628", "hi")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        // The id is forgotten so the redelivery is accepted later
        assert!(recent.insert("wamid.9"));
    }

    #[tokio::test]
    async fn test_unsigned_delivery_is_rejected() {
        let (state, handler) = test_state();
        let queues = state.queues.clone();
        let app = create_router(state);

        let forged = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(
                notification("wamid.x", "15550000000", "!start.ai").to_string(),
            ))
            .unwrap();
        let response = app.oneshot(forged).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        queues.shutdown().await;
        assert!(handler.handled().is_empty());
    }

    #[tokio::test]
    async fn test_wrongly_signed_delivery_is_rejected() {
        let (state, handler) = test_state();
        let queues = state.queues.clone();
        let recent = state.recent.clone();
        let app = create_router(state);

        let response = app
            .oneshot(post_signed_by(
                "someone-else",
                &notification("wamid.x", "15550000000", "!start.ai"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        queues.shutdown().await;
        assert!(handler.handled().is_empty());
        // Rejected deliveries leave no trace in the redelivery filter
        assert!(recent.insert("wamid.x"));
    }

    #[tokio::test]
    async fn test_signature_covers_the_exact_body() {
        let (state, handler) = test_state();
        let queues = state.queues.clone();
        let app = create_router(state);

        let signed = notification("wamid.1", "6281234", "hello").to_string();
        let tampered = notification("wamid.1", "15550000000", "hello").to_string();
        let request = Request::post("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, sign(APP_SECRET, signed.as_bytes()))
            .body(Body::from(tampered))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        queues.shutdown().await;
        assert!(handler.handled().is_empty());
    }

    #[tokio::test]
    async fn test_receive_rejects_malformed_payload() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(post_json(&json!({ "entry": 5 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state();
        let app = create_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["app"], "test-gateway");
        assert_eq!(body["active_senders"], 0);
    }
}
