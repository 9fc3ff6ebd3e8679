//! Callback crypto collaborator.
//!
//! The HTTP handlers only talk to [`MsgCrypt`]. [`WxBizMsgCrypt`] is the
//! production implementation of the platform's encrypted callback scheme:
//!
//! ```text
//! signature = sha1(sort([token, timestamp, nonce, encrypt]))
//! encrypt   = base64(aes256cbc(random16 | len_be32 | msg | receiver_id))
//! ```

pub mod signature;
pub mod wxbiz;

use thiserror::Error;

pub use signature::{msg_signature, verify_msg_signature};
pub use wxbiz::WxBizMsgCrypt;

/// Errors reported by the crypto collaborator.
///
/// Each variant carries the platform's numeric error code, see [`CryptError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptError {
    #[error("signature validation failed")]
    ValidateSignature,

    #[error("xml parse failed: {0}")]
    ParseXml(String),

    #[error("illegal aes key")]
    IllegalAesKey,

    #[error("receiver id mismatch")]
    ValidateCorpid,

    #[error("aes encryption failed")]
    EncryptAes,

    #[error("aes decryption failed")]
    DecryptAes,

    #[error("illegal buffer")]
    IllegalBuffer,

    #[error("base64 decode failed")]
    DecodeBase64,
}

impl CryptError {
    /// Platform error code for this failure.
    pub fn code(&self) -> i32 {
        match self {
            CryptError::ValidateSignature => -40001,
            CryptError::ParseXml(_) => -40002,
            CryptError::IllegalAesKey => -40004,
            CryptError::ValidateCorpid => -40005,
            CryptError::EncryptAes => -40006,
            CryptError::DecryptAes => -40007,
            CryptError::IllegalBuffer => -40008,
            CryptError::DecodeBase64 => -40010,
        }
    }
}

/// Verification, decryption and encryption of callback payloads.
///
/// One instance is shared by every request, so implementations must not
/// hold per-call mutable state.
pub trait MsgCrypt: Send + Sync {
    /// Check the signature of a URL verification challenge and return the
    /// decrypted echo payload.
    fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<Vec<u8>, CryptError>;

    /// Check the signature of an encrypted message envelope and return the
    /// decrypted inner XML.
    fn decrypt_msg(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, CryptError>;

    /// Encrypt and sign a reply, returning the outbound envelope XML.
    fn encrypt_msg(&self, reply: &str, timestamp: &str, nonce: &str)
        -> Result<Vec<u8>, CryptError>;
}
