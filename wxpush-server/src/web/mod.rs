//! Web server module for the platform callback.
//!
//! This module provides a single callback path that:
//! - Answers URL verification challenges (GET)
//! - Decrypts inbound messages and returns an encrypted reply (POST)
//! - Rejects every other method with 405, HEAD included
//!
//! All cryptography goes through the shared [`crate::crypto::MsgCrypt`].

pub mod error;
pub mod handlers;
pub mod query;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub use error::CallbackError;
pub use handlers::{
    health, method_not_allowed, receive_message, verify_url, AppState, HealthResponse,
};
pub use query::{percent_unescape, CallbackQuery};

/// Build the router serving the callback path and `/health`.
pub fn router(state: AppState) -> Router {
    let callback_path = state.config.callback_path.clone();

    Router::new()
        .route("/health", get(health))
        .route(
            &callback_path,
            get(verify_url)
                .post(receive_message)
                .head(method_not_allowed)
                .fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
