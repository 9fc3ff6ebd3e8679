//! AES-256-CBC implementation of the encrypted callback scheme.
//!
//! Key material comes from the 43-character EncodingAESKey, which decodes to
//! 32 bytes of AES key; the IV is the first 16 key bytes. Plaintext frames are
//! padded PKCS#7-style to a 32-byte block, not the AES block size.

use aes::Aes256;
use base64::engine::{
    general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig,
};
use base64::{alphabet, Engine};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use serde::Deserialize;
use tracing::warn;

use super::signature::{msg_signature, verify_msg_signature};
use super::{CryptError, MsgCrypt};
use crate::util::cdata;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Length of an EncodingAESKey.
pub const ENCODING_AES_KEY_LEN: usize = 43;

const PAD_BLOCK: usize = 32;
const RANDOM_PREFIX_LEN: usize = 16;
const LENGTH_PREFIX_LEN: usize = 4;

/// Generated keys do not always have zeroed trailing bits.
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encrypted envelope exchanged with the platform.
///
/// Inbound envelopes carry `ToUserName`, `Encrypt` and `AgentID`; outbound
/// ones carry `Encrypt`, `MsgSignature`, `TimeStamp` and `Nonce`. Only the
/// fields present are populated.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
    #[serde(rename = "MsgSignature", default)]
    pub msg_signature: Option<String>,
    #[serde(rename = "TimeStamp", default)]
    pub timestamp: Option<String>,
    #[serde(rename = "Nonce", default)]
    pub nonce: Option<String>,
}

impl Envelope {
    /// Parse an envelope from raw XML bytes.
    pub fn parse(body: &[u8]) -> Result<Self, CryptError> {
        let text = std::str::from_utf8(body).map_err(|e| CryptError::ParseXml(e.to_string()))?;
        quick_xml::de::from_str(text).map_err(|e| CryptError::ParseXml(e.to_string()))
    }
}

/// Callback crypto bound to one token, key and receiver id.
pub struct WxBizMsgCrypt {
    token: String,
    key: [u8; 32],
    receiver_id: String,
}

impl WxBizMsgCrypt {
    /// Create a new instance, decoding the EncodingAESKey.
    pub fn new(
        token: impl Into<String>,
        encoding_aes_key: &str,
        receiver_id: impl Into<String>,
    ) -> Result<Self, CryptError> {
        Ok(Self {
            token: token.into(),
            key: decode_aes_key(encoding_aes_key)?,
            receiver_id: receiver_id.into(),
        })
    }

    fn iv(&self) -> &[u8] {
        &self.key[..16]
    }

    /// Encrypt `msg` into a base64 frame with a fresh random prefix.
    pub fn encrypt(&self, msg: &[u8]) -> Result<String, CryptError> {
        let mut random = [0u8; RANDOM_PREFIX_LEN];
        rand::thread_rng().fill_bytes(&mut random);

        let receiver = self.receiver_id.as_bytes();
        let mut buf = Vec::with_capacity(
            RANDOM_PREFIX_LEN + LENGTH_PREFIX_LEN + msg.len() + receiver.len() + PAD_BLOCK,
        );
        buf.extend_from_slice(&random);
        buf.extend_from_slice(&(msg.len() as u32).to_be_bytes());
        buf.extend_from_slice(msg);
        buf.extend_from_slice(receiver);
        pkcs7_pad(&mut buf);

        let len = buf.len();
        let cipher = Aes256CbcEnc::new_from_slices(&self.key, self.iv())
            .map_err(|_| CryptError::IllegalAesKey)?;
        let encrypted = cipher
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|_| CryptError::EncryptAes)?;

        Ok(STANDARD.encode(encrypted))
    }

    /// Decrypt a base64 frame and return the message it carries.
    ///
    /// The receiver id at the end of the frame must match this instance's.
    pub fn decrypt(&self, encrypted: &str) -> Result<Vec<u8>, CryptError> {
        let mut buf = STANDARD
            .decode(encrypted.trim())
            .map_err(|_| CryptError::DecodeBase64)?;

        let cipher = Aes256CbcDec::new_from_slices(&self.key, self.iv())
            .map_err(|_| CryptError::IllegalAesKey)?;
        let plain = cipher
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| CryptError::DecryptAes)?;
        let plain = pkcs7_unpad(plain)?;

        if plain.len() < RANDOM_PREFIX_LEN + LENGTH_PREFIX_LEN {
            return Err(CryptError::IllegalBuffer);
        }

        let (len_bytes, rest) = plain[RANDOM_PREFIX_LEN..].split_at(LENGTH_PREFIX_LEN);
        let msg_len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        if rest.len() < msg_len {
            return Err(CryptError::IllegalBuffer);
        }

        let (msg, receiver) = rest.split_at(msg_len);
        if receiver != self.receiver_id.as_bytes() {
            warn!(
                expected_length = self.receiver_id.len(),
                actual_length = receiver.len(),
                "receiver_id_mismatch"
            );
            return Err(CryptError::ValidateCorpid);
        }

        Ok(msg.to_vec())
    }
}

impl MsgCrypt for WxBizMsgCrypt {
    fn verify_url(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        echostr: &str,
    ) -> Result<Vec<u8>, CryptError> {
        if !verify_msg_signature(&self.token, timestamp, nonce, echostr, msg_signature) {
            return Err(CryptError::ValidateSignature);
        }
        self.decrypt(echostr)
    }

    fn decrypt_msg(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, CryptError> {
        let envelope = Envelope::parse(body)?;
        if !verify_msg_signature(&self.token, timestamp, nonce, &envelope.encrypt, msg_signature) {
            return Err(CryptError::ValidateSignature);
        }
        self.decrypt(&envelope.encrypt)
    }

    fn encrypt_msg(
        &self,
        reply: &str,
        timestamp: &str,
        nonce: &str,
    ) -> Result<Vec<u8>, CryptError> {
        let encrypted = self.encrypt(reply.as_bytes())?;
        let signature = msg_signature(&self.token, timestamp, nonce, &encrypted);

        let xml = format!(
            "<xml><Encrypt>{}</Encrypt><MsgSignature>{}</MsgSignature><TimeStamp>{}</TimeStamp><Nonce>{}</Nonce></xml>",
            cdata(&encrypted),
            cdata(&signature),
            timestamp,
            cdata(nonce),
        );

        Ok(xml.into_bytes())
    }
}

fn decode_aes_key(encoding_aes_key: &str) -> Result<[u8; 32], CryptError> {
    let trimmed = encoding_aes_key.trim();
    if trimmed.len() != ENCODING_AES_KEY_LEN {
        return Err(CryptError::IllegalAesKey);
    }

    let bytes = KEY_ENGINE
        .decode(trimmed)
        .map_err(|_| CryptError::IllegalAesKey)?;

    bytes.try_into().map_err(|_| CryptError::IllegalAesKey)
}

fn pkcs7_pad(buf: &mut Vec<u8>) {
    let pad = PAD_BLOCK - buf.len() % PAD_BLOCK;
    buf.resize(buf.len() + pad, pad as u8);
}

fn pkcs7_unpad(buf: &[u8]) -> Result<&[u8], CryptError> {
    let pad = *buf.last().ok_or(CryptError::IllegalBuffer)? as usize;
    if pad == 0 || pad > PAD_BLOCK || pad > buf.len() {
        return Err(CryptError::IllegalBuffer);
    }
    Ok(&buf[..buf.len() - pad])
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";
    const TOKEN: &str = "QDG6eK";
    const CORP: &str = "wx5823bf96d3bd56c7";

    fn crypt() -> WxBizMsgCrypt {
        WxBizMsgCrypt::new(TOKEN, KEY, CORP).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_keys() {
        assert_eq!(
            WxBizMsgCrypt::new(TOKEN, "short", CORP).err(),
            Some(CryptError::IllegalAesKey)
        );
        // Right length, but '*' is outside the base64 alphabet
        assert_eq!(
            WxBizMsgCrypt::new(TOKEN, "*bcdefghijklmnopqrstuvwxyz0123456789ABCDEFG", CORP).err(),
            Some(CryptError::IllegalAesKey)
        );
    }

    #[test]
    fn test_pkcs7_pad_to_32_byte_blocks() {
        let mut buf = vec![1u8; 5];
        pkcs7_pad(&mut buf);
        assert_eq!(buf.len(), 32);
        assert_eq!(buf[31], 27);

        let mut full = vec![1u8; 32];
        pkcs7_pad(&mut full);
        assert_eq!(full.len(), 64);
        assert_eq!(full[63], 32);
        assert_eq!(pkcs7_unpad(&full).unwrap(), &[1u8; 32][..]);
    }

    #[test]
    fn test_pkcs7_unpad_rejects_bad_padding() {
        assert_eq!(pkcs7_unpad(&[]), Err(CryptError::IllegalBuffer));
        assert_eq!(pkcs7_unpad(&[1, 2, 0]), Err(CryptError::IllegalBuffer));
        assert_eq!(pkcs7_unpad(&[1, 2, 33]), Err(CryptError::IllegalBuffer));
    }

    #[test]
    fn test_encrypt_decrypt() {
        let crypt = crypt();
        let encrypted = crypt.encrypt("<xml>你好</xml>".as_bytes()).unwrap();
        assert_eq!(crypt.decrypt(&encrypted).unwrap(), "<xml>你好</xml>".as_bytes());
    }

    #[test]
    fn test_encrypt_uses_fresh_random_prefix() {
        let crypt = crypt();
        assert_ne!(crypt.encrypt(b"same").unwrap(), crypt.encrypt(b"same").unwrap());
    }

    #[test]
    fn test_decrypt_rejects_other_receiver() {
        let encrypted = crypt().encrypt(b"hello").unwrap();
        let other = WxBizMsgCrypt::new(TOKEN, KEY, "another-corp").unwrap();
        assert_eq!(other.decrypt(&encrypted), Err(CryptError::ValidateCorpid));
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let crypt = crypt();
        assert_eq!(crypt.decrypt("not base64!"), Err(CryptError::DecodeBase64));
        // 10 bytes is not a whole AES block
        assert_eq!(
            crypt.decrypt(&STANDARD.encode([0u8; 10])),
            Err(CryptError::DecryptAes)
        );
    }

    #[test]
    fn test_verify_url() {
        let crypt = crypt();
        let echostr = crypt.encrypt(b"1616140317555161061").unwrap();
        let sig = msg_signature(TOKEN, "1409659589", "263014780", &echostr);

        let echo = crypt.verify_url(&sig, "1409659589", "263014780", &echostr).unwrap();
        assert_eq!(echo, b"1616140317555161061");

        assert_eq!(
            crypt.verify_url(&sig, "1409659590", "263014780", &echostr),
            Err(CryptError::ValidateSignature)
        );
    }

    #[test]
    fn test_encrypt_msg_then_decrypt_msg() {
        let crypt = crypt();
        let reply = "<xml><Content><![CDATA[hi]]></Content></xml>";

        let out = crypt.encrypt_msg(reply, "1690000000", "42").unwrap();
        let envelope = Envelope::parse(&out).unwrap();
        assert_eq!(envelope.timestamp.as_deref(), Some("1690000000"));
        assert_eq!(envelope.nonce.as_deref(), Some("42"));

        let sig = envelope.msg_signature.unwrap();
        let plain = crypt.decrypt_msg(&sig, "1690000000", "42", &out).unwrap();
        assert_eq!(plain, reply.as_bytes());
    }

    #[test]
    fn test_decrypt_msg_inbound_envelope() {
        let crypt = crypt();
        let encrypted = crypt.encrypt(b"<xml><MsgType>text</MsgType></xml>").unwrap();
        let sig = msg_signature(TOKEN, "1690000000", "nonce", &encrypted);
        let body = format!(
            "<xml><ToUserName><![CDATA[{}]]></ToUserName><Encrypt><![CDATA[{}]]></Encrypt><AgentID><![CDATA[218]]></AgentID></xml>",
            CORP, encrypted
        );

        let plain = crypt.decrypt_msg(&sig, "1690000000", "nonce", body.as_bytes()).unwrap();
        assert_eq!(plain, b"<xml><MsgType>text</MsgType></xml>");
    }

    #[test]
    fn test_decrypt_msg_rejects_bad_signature() {
        let crypt = crypt();
        let out = crypt.encrypt_msg("<xml/>", "1690000000", "42").unwrap();
        assert_eq!(
            crypt.decrypt_msg("0000", "1690000000", "42", &out),
            Err(CryptError::ValidateSignature)
        );
    }

    #[test]
    fn test_decrypt_msg_rejects_missing_encrypt() {
        let err = crypt()
            .decrypt_msg("sig", "1", "2", b"<xml><ToUserName>x</ToUserName></xml>")
            .unwrap_err();
        assert_eq!(err.code(), -40002);
    }
}
