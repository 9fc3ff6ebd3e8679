//! WxPush - Callback endpoint for the WeCom encrypted message protocol.
//!
//! ## Architecture
//!
//! ```text
//! GET  /cgi-bin/wxpush → verify_url      → MsgCrypt::verify_url  → plaintext echo
//! POST /cgi-bin/wxpush → receive_message → MsgCrypt::decrypt_msg → InboundMessage
//!                                        → ReplyStrategy         → MsgCrypt::encrypt_msg
//! ```

pub mod config;
pub mod crypto;
pub mod message;
pub mod util;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use crypto::{CryptError, MsgCrypt, WxBizMsgCrypt};
pub use message::{EchoReply, InboundMessage, OutboundMessage, ReplyStrategy};
pub use web::{router, AppState, CallbackError};
