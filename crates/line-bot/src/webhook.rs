//! Webhook endpoint for inbound platform deliveries
//!
//! Verifies the `x-line-signature` header (HMAC-SHA256 of the raw body with
//! the channel secret, base64-encoded) before parsing, then processes every
//! event in the delivery and acknowledges with 200 only once all of them
//! have been handled.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{error, warn};

use line_types::WebhookDelivery;

use crate::handlers::{self, AppContext};

type HmacSha256 = Hmac<Sha256>;

/// Create the webhook router.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/callback", post(handle_callback))
        .with_state(ctx)
}

async fn handle_callback(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !verify_signature(&ctx.config.line.channel_secret, &body, signature) {
        warn!("Rejected webhook request: invalid signature");
        return (StatusCode::BAD_REQUEST, "invalid signature").into_response();
    }

    let delivery: WebhookDelivery = match serde_json::from_slice(&body) {
        Ok(delivery) => delivery,
        Err(e) => {
            error!(error = %e, "Failed to parse webhook body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if let Err(e) = handlers::handle_delivery(delivery, &ctx).await {
        error!(error = %e, "Failed to process webhook delivery");
        ctx.health.increment_errors().await;
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (StatusCode::OK, "OK").into_response()
}

/// Check a webhook signature against the channel secret.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let mut mac =
        HmacSha256::new_from_slice(channel_secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());
    expected == signature
}
