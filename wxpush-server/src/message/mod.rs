//! Decrypted callback messages.
//!
//! ## Processing Flow
//!
//! ```text
//! decrypted XML → parse_inbound() → InboundMessage → ReplyStrategy → OutboundMessage → to_xml()
//! ```

pub mod reply;

use serde::Deserialize;
use thiserror::Error;

pub use reply::{EchoReply, OutboundMessage, ReplyStrategy};

/// Errors raised while parsing a decrypted message.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("message does not match the expected shape: {0}")]
    Xml(#[from] quick_xml::DeError),
}

/// Inbound message record, as found inside the decrypted `<xml>` element.
///
/// Event callbacks carry no `Content` or `MsgId`; those default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "ToUserName")]
    pub to_user_name: String,
    #[serde(rename = "FromUserName")]
    pub from_user_name: String,
    #[serde(rename = "CreateTime")]
    pub create_time: u32,
    #[serde(rename = "MsgType")]
    pub msg_type: String,
    #[serde(rename = "Content", default)]
    pub content: String,
    #[serde(rename = "MsgId", default)]
    pub msg_id: String,
    #[serde(rename = "AgentID", alias = "AgentId")]
    pub agent_id: u32,
}

/// Parse a decrypted message body.
pub fn parse_inbound(xml: &[u8]) -> Result<InboundMessage, MessageError> {
    let text = std::str::from_utf8(xml)?;
    Ok(quick_xml::de::from_str(text)?)
}
