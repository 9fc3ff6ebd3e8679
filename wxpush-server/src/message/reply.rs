//! Reply generation.
//!
//! A [`ReplyStrategy`] turns an inbound message into the message sent back to
//! the platform. [`EchoReply`] is the default auto-reply.

use super::InboundMessage;
use crate::util::cdata;

/// Reply message, rendered into the plaintext handed to the encryptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to_user_name: String,
    pub from_user_name: String,
    pub create_time: i64,
    pub msg_type: String,
    pub content: String,
    pub agent_id: u32,
}

impl OutboundMessage {
    /// Render the reply as a single-message XML envelope.
    pub fn to_xml(&self) -> String {
        format!(
            "<xml>\n<ToUserName>{}</ToUserName>\n<FromUserName>{}</FromUserName>\n<CreateTime>{}</CreateTime>\n<MsgType>{}</MsgType>\n<Content>{}</Content>\n<AgentID>{}</AgentID>\n</xml>",
            cdata(&self.to_user_name),
            cdata(&self.from_user_name),
            self.create_time,
            cdata(&self.msg_type),
            cdata(&self.content),
            self.agent_id,
        )
    }
}

/// Builds the reply for an inbound message.
pub trait ReplyStrategy: Send + Sync {
    /// `now` is the current Unix time in seconds.
    fn reply(&self, inbound: &InboundMessage, now: i64) -> OutboundMessage;
}

/// Replies with a text message quoting the inbound content.
#[derive(Debug, Clone)]
pub struct EchoReply {
    prefix: String,
}

impl EchoReply {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ReplyStrategy for EchoReply {
    fn reply(&self, inbound: &InboundMessage, now: i64) -> OutboundMessage {
        OutboundMessage {
            to_user_name: inbound.from_user_name.clone(),
            from_user_name: inbound.to_user_name.clone(),
            create_time: now,
            msg_type: "text".to_string(),
            content: format!("{}{}", self.prefix, inbound.content),
            agent_id: inbound.agent_id,
        }
    }
}
