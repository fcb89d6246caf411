use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ingress::RequestHandler;
use crate::server::http::AppState;
use crate::server::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::slack::{messages, SlashCommand};

/// Interaction posts carry the JSON in a single form field.
#[derive(Deserialize)]
struct InteractionForm {
    #[serde(default)]
    payload: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Check the request signature when a signing secret is configured.
fn verify_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), StatusCode> {
    let Some(secret) = &state.config.server.signing_secret else {
        return Ok(());
    };

    let (Some(timestamp), Some(sig)) = (
        header(headers, TIMESTAMP_HEADER),
        header(headers, SIGNATURE_HEADER),
    ) else {
        warn!("Missing Slack signature headers");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let now = chrono::Utc::now().timestamp();
    signature::verify(secret, timestamp, body, sig, now).map_err(|e| {
        warn!("Rejected Slack request: {}", e);
        StatusCode::UNAUTHORIZED
    })
}

/// Legacy token check, only used when no signing secret is configured.
fn verify_token(state: &AppState, token: Option<&str>) -> Result<(), StatusCode> {
    if state.config.server.signing_secret.is_some() {
        return Ok(());
    }
    match &state.config.server.verification_token {
        Some(expected) if token != Some(expected.as_str()) => {
            warn!("Invalid Slack verification token");
            Err(StatusCode::UNAUTHORIZED)
        }
        _ => Ok(()),
    }
}

/// Report selection from the interactive menu.
pub async fn actions_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    if let Err(status) = verify_signature(&state, &headers, &body) {
        return status.into_response();
    }

    let form: InteractionForm = match serde_urlencoded::from_bytes(&body) {
        Ok(f) => f,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let Some(raw) = form.payload else {
        return (StatusCode::BAD_REQUEST, "missing payload").into_response();
    };

    let payload = match RequestHandler::parse_payload(&raw) {
        Ok(p) => p,
        Err(e) => {
            warn!("{}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if let Err(status) = verify_token(&state, payload.token.as_deref()) {
        return status.into_response();
    }

    if let Some(user) = &payload.user {
        debug!("Report selection from {}", user.id);
    }

    match state.handler.handle(&payload) {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            warn!("Rejected interaction: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Slash command: reply with the report selection menu.
pub async fn command_handler(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    if let Err(status) = verify_signature(&state, &headers, &body) {
        return status.into_response();
    }

    let command: SlashCommand = match serde_urlencoded::from_bytes(&body) {
        Ok(c) => c,
        Err(e) => {
            warn!("Malformed slash command: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if let Err(status) = verify_token(&state, command.token.as_deref()) {
        return status.into_response();
    }

    info!(
        "Slash command {} from {}",
        command.command,
        command.user_id.as_deref().unwrap_or("unknown")
    );

    Json(messages::report_menu(state.handler.registry().list_available())).into_response()
}
