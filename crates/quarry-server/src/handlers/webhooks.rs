//! Provider webhook receiver.
//!
//! Deliveries are always acknowledged with 200: providers disable webhooks
//! that keep failing, and the job record is the only place processing
//! errors surface.

use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
};

use quarry_client::ApifyWebhookPayload;
use quarry_core::{ProviderKind, WebhookOutcome};

use crate::auth::webhook_token_valid;
use crate::dto::{WebhookAck, WebhookQuery};
use crate::state::AppState;

/// Largest webhook body read; larger deliveries are acknowledged and dropped.
pub const WEBHOOK_BODY_LIMIT: usize = 1024 * 1024;

/// Receive a provider completion webhook.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/{provider}",
    params(
        ("provider" = String, Path, description = "Provider name (apify)"),
        ("token" = Option<String>, Query, description = "Shared webhook secret"),
    ),
    request_body(content = Object, description = "Provider webhook payload"),
    responses(
        (status = 200, description = "Delivery acknowledged", body = WebhookAck),
    ),
    tag = "webhooks"
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    query: Result<Query<WebhookQuery>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Json<WebhookAck> {
    let query = query.map(|Query(query)| query).unwrap_or_else(|e| {
        tracing::warn!(%provider, error = %e, "Unreadable webhook query");
        WebhookQuery::default()
    });

    let outcome = match body {
        Ok(body) => handle_delivery(&state, &provider, query.token.as_deref(), &body).await,
        Err(e) => {
            tracing::warn!(%provider, error = %e, "Unreadable webhook body");
            WebhookOutcome::Ignored
        }
    };
    tracing::debug!(%provider, ?outcome, "Webhook acknowledged");

    Json(WebhookAck { received: true })
}

async fn handle_delivery(
    state: &AppState,
    provider: &str,
    token: Option<&str>,
    body: &[u8],
) -> WebhookOutcome {
    if !webhook_token_valid(state.webhook_secret.as_deref(), token) {
        tracing::warn!(%provider, "Webhook delivery with invalid token");
        return WebhookOutcome::Ignored;
    }

    match provider.parse::<ProviderKind>() {
        Ok(ProviderKind::Apify) => {}
        Ok(other) => {
            tracing::warn!(provider = %other, "Provider does not deliver webhooks");
            return WebhookOutcome::Ignored;
        }
        Err(_) => {
            tracing::warn!(%provider, "Webhook for unknown provider");
            return WebhookOutcome::Ignored;
        }
    }

    let payload: ApifyWebhookPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(%provider, error = %e, "Malformed webhook payload");
            return WebhookOutcome::Ignored;
        }
    };

    let Some(notification) = payload.into_notification() else {
        tracing::warn!(%provider, "Webhook payload without run id");
        return WebhookOutcome::Ignored;
    };

    state.webhook.handle(notification).await
}
