//! Callback endpoint handlers.
//!
//! Every request is handled start to finish on its own; the only shared
//! state is the read-only [`AppState`].

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{rejection::QueryRejection, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::error::CallbackError;
use super::query::CallbackQuery;
use crate::crypto::MsgCrypt;
use crate::message::{parse_inbound, ReplyStrategy};
use crate::util::{unix_nanos, unix_seconds};
use crate::Config;

/// Largest callback body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub crypt: Arc<dyn MsgCrypt>,
    pub replier: Arc<dyn ReplyStrategy>,
}

impl AppState {
    pub fn new(
        config: Config,
        crypt: Arc<dyn MsgCrypt>,
        replier: Arc<dyn ReplyStrategy>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            crypt,
            replier,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// URL Verification (GET)
// =============================================================================

/// Callback URL verification.
///
/// This endpoint:
/// 1. Percent-decodes the echo challenge
/// 2. Verifies and decrypts it through the crypto collaborator
/// 3. Returns the plaintext echo as the body
pub async fn verify_url(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<Response, CallbackError> {
    let query = callback_query(query)?;
    let tuple = query.signature_tuple()?;
    let echostr = query.decoded_echostr()?;

    info!(
        timestamp = %tuple.timestamp,
        nonce = %tuple.nonce,
        echostr_length = echostr.len(),
        "verify_url_received"
    );

    let echo = state
        .crypt
        .verify_url(tuple.msg_signature, tuple.timestamp, tuple.nonce, &echostr)
        .map_err(CallbackError::VerifyUrl)?;

    info!(echo_length = echo.len(), "verify_url_success");

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], echo).into_response())
}

// =============================================================================
// Message Callback (POST)
// =============================================================================

/// Encrypted message callback.
///
/// This endpoint:
/// 1. Reads and decrypts the envelope
/// 2. Parses the inbound message and builds a reply
/// 3. Encrypts the reply with a fresh timestamp and nonce
pub async fn receive_message(
    State(state): State<AppState>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    body: Body,
) -> Result<Response, CallbackError> {
    let query = callback_query(query)?;
    let tuple = query.signature_tuple()?;

    let raw = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| CallbackError::ReadBody(e.to_string()))?;

    info!(
        timestamp = %tuple.timestamp,
        nonce = %tuple.nonce,
        body_length = raw.len(),
        "message_received"
    );

    let plain = state
        .crypt
        .decrypt_msg(tuple.msg_signature, tuple.timestamp, tuple.nonce, &raw)
        .map_err(CallbackError::DecryptMsg)?;

    debug!(msg = %String::from_utf8_lossy(&plain), "decrypt_msg_success");

    let inbound = parse_inbound(&plain).map_err(CallbackError::ParseMessage)?;

    info!(
        from = %inbound.from_user_name,
        to = %inbound.to_user_name,
        msg_type = %inbound.msg_type,
        msg_id = %inbound.msg_id,
        agent_id = inbound.agent_id,
        "message_parsed"
    );

    let reply = state.replier.reply(&inbound, unix_seconds());

    let timestamp = unix_seconds().to_string();
    let nonce = unix_nanos().to_string();
    let encrypted = state
        .crypt
        .encrypt_msg(&reply.to_xml(), &timestamp, &nonce)
        .map_err(CallbackError::EncryptMsg)?;

    info!(
        to = %reply.to_user_name,
        response_length = encrypted.len(),
        "encrypt_msg_success"
    );

    Ok(([(header::CONTENT_TYPE, "application/xml")], encrypted).into_response())
}

fn callback_query(
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<CallbackQuery, CallbackError> {
    query
        .map(|Query(query)| query)
        .map_err(|e| CallbackError::InvalidQuery(e.body_text()))
}

/// Any verb other than GET or POST on the callback path.
pub async fn method_not_allowed(method: Method) -> (StatusCode, &'static str) {
    warn!(method = %method, "callback_method_not_allowed");
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
