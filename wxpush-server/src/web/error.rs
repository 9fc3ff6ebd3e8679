//! HTTP error mapping for the callback handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::crypto::CryptError;
use crate::message::MessageError;

/// Terminal failure of a callback request.
///
/// Inbound defects up to and including decryption are client errors;
/// failures on already-authenticated content are server errors.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("Invalid query string")]
    InvalidQuery(String),

    #[error("Missing query parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Invalid echostr parameter")]
    InvalidEchostr,

    #[error("Failed to read request body")]
    ReadBody(String),

    #[error("VerifyURL fail: {0}")]
    VerifyUrl(CryptError),

    #[error("DecryptMsg fail: {0}")]
    DecryptMsg(CryptError),

    #[error("Failed to parse message")]
    ParseMessage(#[source] MessageError),

    #[error("EncryptMsg fail: {0}")]
    EncryptMsg(CryptError),
}

impl CallbackError {
    pub fn status(&self) -> StatusCode {
        match self {
            CallbackError::InvalidQuery(_)
            | CallbackError::MissingParameter(_)
            | CallbackError::InvalidEchostr
            | CallbackError::ReadBody(_)
            | CallbackError::VerifyUrl(_)
            | CallbackError::DecryptMsg(_) => StatusCode::BAD_REQUEST,
            CallbackError::ParseMessage(_) | CallbackError::EncryptMsg(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn detail(&self) -> String {
        match self {
            CallbackError::InvalidQuery(detail) | CallbackError::ReadBody(detail) => detail.clone(),
            CallbackError::VerifyUrl(e)
            | CallbackError::DecryptMsg(e)
            | CallbackError::EncryptMsg(e) => format!("code {}: {}", e.code(), e),
            CallbackError::ParseMessage(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for CallbackError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(
                status = status.as_u16(),
                error = %self,
                detail = %self.detail(),
                "callback_failed"
            );
        } else {
            warn!(
                status = status.as_u16(),
                error = %self,
                detail = %self.detail(),
                "callback_rejected"
            );
        }

        (status, self.to_string()).into_response()
    }
}
