// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the intake API.
//!
//! `POST /v1/intake/messages` is the conversation entry point; the body is
//! validated by hand so a missing or non-string `message` comes back as a
//! clean 400 instead of a generic deserialization error. Session identity
//! belongs to the caller -- an unknown `session_id` starts a conversation
//! under that id, and no id at all mints a fresh session.

use std::net::SocketAddr;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use caseline_core::{CaselineError, ClientMeta, LeadStatus, LeadStore, Stage};
use serde::Serialize;
use tracing::error;

use crate::rate_limit::client_ip;
use crate::server::GatewayState;

/// Response body for POST /v1/intake/messages.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub session_id: String,
    /// The next conversational reply to render in the widget.
    pub reply: String,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_status: Option<LeadStatus>,
}

/// Response body for GET /v1/intake/sessions/{id}.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_status: Option<LeadStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_category: Option<String>,
    pub updated_at: String,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// POST /v1/intake/messages
///
/// Accepts `{message, session_id?, trusted_form_cert_url?}` and runs one
/// conversational turn.
pub async fn post_intake_message(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(&format!("invalid JSON body: {rejection}")),
    };
    let Some(fields) = body.as_object() else {
        return bad_request("request body must be a JSON object");
    };

    let message = match fields.get("message") {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(serde_json::Value::String(_)) => return bad_request("`message` must not be blank"),
        Some(_) => return bad_request("`message` must be a string"),
        None => return bad_request("`message` is required"),
    };
    let session_id = match fields.get("session_id") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(serde_json::Value::String(_)) => None,
        Some(_) => return bad_request("`session_id` must be a string"),
    };

    let meta = ClientMeta {
        ip: client_ip(&headers, Some(addr)),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string(),
        trusted_form_cert_url: fields
            .get("trusted_form_cert_url")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    };

    match state.engine.handle_message(session_id, &message, &meta).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(MessageResponse {
                session_id: reply.session_id,
                reply: reply.reply,
                stage: reply.stage,
                lead_status: reply.lead_status,
            }),
        )
            .into_response(),
        Err(CaselineError::Channel { message, .. }) => bad_request(&message),
        Err(e) => {
            error!(error = %e, "intake turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "something went wrong on our end -- please send the message again"
                        .to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /v1/intake/sessions/{id}
///
/// Async status polling for submitted leads.
pub async fn get_session_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    match state.store.get_session(&id).await {
        Ok(Some(session)) => (
            StatusCode::OK,
            Json(SessionStatusResponse {
                session_id: session.id,
                stage: session.stage,
                lead_status: session.lead_status,
                main_category: session.main_category,
                sub_category: session.sub_category,
                updated_at: session.updated_at,
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "session not found".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!(session_id = %id, error = %e, "session status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "something went wrong on our end -- please try again".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health -- public, for load balancers and process supervisors.
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
