//! Callback query parameters.

use percent_encoding::percent_decode_str;
use serde::Deserialize;

use super::error::CallbackError;

/// Query string sent with every callback.
///
/// Fields default to empty so that a missing parameter is reported by name
/// instead of as a generic extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub msg_signature: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub echostr: String,
}

/// The (signature, timestamp, nonce) triple of a callback.
#[derive(Debug, Clone, Copy)]
pub struct SignatureTuple<'a> {
    pub msg_signature: &'a str,
    pub timestamp: &'a str,
    pub nonce: &'a str,
}

impl CallbackQuery {
    pub fn signature_tuple(&self) -> Result<SignatureTuple<'_>, CallbackError> {
        Ok(SignatureTuple {
            msg_signature: required("msg_signature", &self.msg_signature)?,
            timestamp: required("timestamp", &self.timestamp)?,
            nonce: required("nonce", &self.nonce)?,
        })
    }

    /// The echo challenge, percent-decoded once more.
    ///
    /// The platform URL-encodes the challenge on top of the query encoding.
    pub fn decoded_echostr(&self) -> Result<String, CallbackError> {
        let raw = required("echostr", &self.echostr)?;
        percent_unescape(raw).ok_or(CallbackError::InvalidEchostr)
    }
}

fn required<'a>(name: &'static str, value: &'a str) -> Result<&'a str, CallbackError> {
    if value.is_empty() {
        Err(CallbackError::MissingParameter(name))
    } else {
        Ok(value)
    }
}

/// Strictly percent-decode `input`.
///
/// Returns `None` when a `%` is not followed by two hex digits or the result
/// is not UTF-8. `+` is left as is, since base64 payloads contain it.
pub fn percent_unescape(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            match bytes.get(i + 1..i + 3) {
                Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => i += 3,
                _ => return None,
            }
        } else {
            i += 1;
        }
    }

    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
