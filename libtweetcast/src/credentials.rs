//! API credentials
//!
//! The four OAuth 1.0a secrets are read once from the environment and then
//! shared read-only. They are wrapped in [`SecretString`] so they never show
//! up in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};

use crate::error::{ConfigError, Result};

pub const CONSUMER_KEY_VAR: &str = "TWITTER_CONSUMER_KEY";
pub const CONSUMER_SECRET_VAR: &str = "TWITTER_CONSUMER_SECRET";
pub const ACCESS_TOKEN_VAR: &str = "TWITTER_ACCESS_TOKEN";
pub const ACCESS_TOKEN_SECRET_VAR: &str = "TWITTER_ACCESS_TOKEN_SECRET";

#[derive(Debug)]
pub struct Credentials {
    consumer_key: SecretString,
    consumer_secret: SecretString,
    access_token: SecretString,
    access_token_secret: SecretString,
}

impl Credentials {
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Result<Self> {
        let fields = [
            (CONSUMER_KEY_VAR, consumer_key.into()),
            (CONSUMER_SECRET_VAR, consumer_secret.into()),
            (ACCESS_TOKEN_VAR, access_token.into()),
            (ACCESS_TOKEN_SECRET_VAR, access_token_secret.into()),
        ];
        Self::from_lookup(|name| {
            fields
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, value)| value.clone())
        })
    }

    /// Read all four secrets from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from an arbitrary lookup, failing on the first
    /// secret that is absent or blank
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &str| -> Result<SecretString> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => {
                    Ok(SecretString::from(value.trim().to_string()))
                }
                _ => Err(ConfigError::MissingCredential(name.to_string()).into()),
            }
        };

        Ok(Self {
            consumer_key: require(CONSUMER_KEY_VAR)?,
            consumer_secret: require(CONSUMER_SECRET_VAR)?,
            access_token: require(ACCESS_TOKEN_VAR)?,
            access_token_secret: require(ACCESS_TOKEN_SECRET_VAR)?,
        })
    }

    pub(crate) fn consumer_key(&self) -> &str {
        self.consumer_key.expose_secret()
    }

    pub(crate) fn consumer_secret(&self) -> &str {
        self.consumer_secret.expose_secret()
    }

    pub(crate) fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub(crate) fn access_token_secret(&self) -> &str {
        self.access_token_secret.expose_secret()
    }
}
