//! Configuration module for environment variable parsing.
//!
//! The callback secrets are injected at process start and never change
//! afterwards. They are only ever logged as "set" or "not set".

use std::env;
use std::fmt;

use thiserror::Error;
use tracing::warn;

/// Default path the platform is configured to call back on.
pub const DEFAULT_CALLBACK_PATH: &str = "/cgi-bin/wxpush";

/// Default prefix of the auto-reply text.
pub const DEFAULT_REPLY_PREFIX: &str = "收到您的消息: ";

/// Errors raised while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("callback path must start with '/': {0}")]
    InvalidCallbackPath(String),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Callback token shared with the platform
    pub token: String,

    /// 43-character EncodingAESKey
    pub encoding_aes_key: String,

    /// Receiver id (corp id) appended to every encrypted frame
    pub receiver_id: String,

    /// Path the callback router listens on
    pub callback_path: String,

    /// Prefix of the echo auto-reply
    pub reply_prefix: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let callback_path = env::var("WXPUSH_CALLBACK_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CALLBACK_PATH.to_string());

        if !callback_path.starts_with('/') {
            return Err(ConfigError::InvalidCallbackPath(callback_path));
        }

        Ok(Config {
            port: parse_port("PORT", 8090),
            token: required("WXPUSH_TOKEN")?,
            encoding_aes_key: required("WXPUSH_ENCODING_AES_KEY")?,
            receiver_id: required("WXPUSH_RECEIVER_ID")?,
            callback_path,
            reply_prefix: env::var("WXPUSH_REPLY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_REPLY_PREFIX.to_string()),
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("token", &"<redacted>")
            .field("encoding_aes_key", &"<redacted>")
            .field("receiver_id", &self.receiver_id)
            .field("callback_path", &self.callback_path)
            .field("reply_prefix", &self.reply_prefix)
            .finish()
    }
}

/// Read a variable that must be present and non-blank.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

fn parse_port(name: &str, default: u16) -> u16 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(env_var = name, value = %raw, "Invalid port, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: &[&str] = &[
        "PORT",
        "WXPUSH_TOKEN",
        "WXPUSH_ENCODING_AES_KEY",
        "WXPUSH_RECEIVER_ID",
        "WXPUSH_CALLBACK_PATH",
        "WXPUSH_REPLY_PREFIX",
    ];

    fn clear() {
        for name in VARS {
            env::remove_var(name);
        }
    }

    // The process environment is shared, so every from_env case runs in one test.
    #[test]
    fn test_from_env() {
        clear();
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("WXPUSH_TOKEN")
        );

        env::set_var("WXPUSH_TOKEN", "token");
        env::set_var("WXPUSH_ENCODING_AES_KEY", "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG");
        env::set_var("WXPUSH_RECEIVER_ID", "   ");
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::Missing("WXPUSH_RECEIVER_ID")
        );

        env::set_var("WXPUSH_RECEIVER_ID", "wx5823bf96d3bd56c7");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8090);
        assert_eq!(config.token, "token");
        assert_eq!(config.receiver_id, "wx5823bf96d3bd56c7");
        assert_eq!(config.callback_path, DEFAULT_CALLBACK_PATH);
        assert_eq!(config.reply_prefix, DEFAULT_REPLY_PREFIX);

        env::set_var("PORT", "9000");
        env::set_var("WXPUSH_CALLBACK_PATH", "/callback");
        env::set_var("WXPUSH_REPLY_PREFIX", "got: ");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.callback_path, "/callback");
        assert_eq!(config.reply_prefix, "got: ");

        env::set_var("PORT", "not-a-port");
        assert_eq!(Config::from_env().unwrap().port, 8090);

        env::set_var("WXPUSH_CALLBACK_PATH", "callback");
        assert_eq!(
            Config::from_env().unwrap_err(),
            ConfigError::InvalidCallbackPath("callback".to_string())
        );

        clear();
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config {
            port: 8090,
            token: "super-secret-token".to_string(),
            encoding_aes_key: "super-secret-key".to_string(),
            receiver_id: "corp".to_string(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            reply_prefix: DEFAULT_REPLY_PREFIX.to_string(),
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("corp"));
    }
}
