use crate::core::config::ExchangeConfig;
use crate::core::errors::ExchangeError;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const ACCESS_KEY_HEADER: &str = "CB-ACCESS-KEY";
pub const ACCESS_SIGN_HEADER: &str = "CB-ACCESS-SIGN";
pub const ACCESS_TIMESTAMP_HEADER: &str = "CB-ACCESS-TIMESTAMP";
pub const ACCESS_PASSPHRASE_HEADER: &str = "CB-ACCESS-PASSPHRASE";

/// API key, base64 secret and passphrase issued by the exchange
///
/// Fields are optional so a partially filled configuration can be represented;
/// the all-or-nothing rule is enforced when a request is signed. Empty strings
/// are treated as absent.
#[derive(Clone, Default)]
pub struct Credentials {
    api_key: Option<String>,
    secret: Option<SecretString>,
    passphrase: Option<SecretString>,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self::from_parts(
            Some(api_key.into()),
            Some(secret.into()),
            Some(passphrase.into()),
        )
    }

    pub fn from_parts(
        api_key: Option<String>,
        secret: Option<String>,
        passphrase: Option<String>,
    ) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.is_empty()),
            secret: secret.filter(|s| !s.is_empty()).map(SecretString::new),
            passphrase: passphrase.filter(|p| !p.is_empty()).map(SecretString::new),
        }
    }

    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self::new(config.api_key(), config.secret(), config.passphrase())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.secret.is_none() && self.passphrase.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.api_key.is_some() && self.secret.is_some() && self.passphrase.is_some()
    }

    fn complete(&self) -> Result<(&str, &str, &str), ExchangeError> {
        match (&self.api_key, &self.secret, &self.passphrase) {
            (Some(key), Some(secret), Some(passphrase)) => {
                Ok((
                    key.as_str(),
                    secret.expose_secret().as_str(),
                    passphrase.expose_secret().as_str(),
                ))
            }
            _ if self.is_empty() => Err(ExchangeError::InvalidCredentials(
                "no API key, secret or passphrase configured".to_string(),
            )),
            _ => Err(ExchangeError::InvalidCredentials(format!(
                "API key, secret and passphrase must all be set (missing: {})",
                self.missing_fields().join(", ")
            ))),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("api key");
        }
        if self.secret.is_none() {
            missing.push("secret");
        }
        if self.passphrase.is_none() {
            missing.push("passphrase");
        }
        missing
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The four `CB-ACCESS-*` values for a single request
///
/// Bound to the timestamp it was produced with; build a fresh set per request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
    pub key: String,
    pub signature: String,
    pub timestamp: String,
    pub passphrase: String,
}

impl AuthHeaders {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (ACCESS_KEY_HEADER, self.key.as_str()),
            (ACCESS_SIGN_HEADER, self.signature.as_str()),
            (ACCESS_TIMESTAMP_HEADER, self.timestamp.as_str()),
            (ACCESS_PASSPHRASE_HEADER, self.passphrase.as_str()),
        ]
        .into_iter()
    }
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaders")
            .field("key", &self.key)
            .field("signature", &self.signature)
            .field("timestamp", &self.timestamp)
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

/// The byte sequence fed to HMAC: `timestamp + METHOD + request_path + body`
pub fn prehash(timestamp: &str, method: &str, request_path: &str, body: &[u8]) -> Vec<u8> {
    let mut message =
        Vec::with_capacity(timestamp.len() + method.len() + request_path.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(method.to_ascii_uppercase().as_bytes());
    message.extend_from_slice(request_path.as_bytes());
    message.extend_from_slice(body);
    message
}

/// Sign one request
///
/// # Arguments
/// * `timestamp` - Unix seconds, captured once by the caller
/// * `method` - HTTP verb, any case
/// * `request_path` - Path including the query string exactly as sent
/// * `body` - Raw body bytes, empty when there is none
pub fn sign(
    credentials: &Credentials,
    timestamp: u64,
    method: &str,
    request_path: &str,
    body: &[u8],
) -> Result<AuthHeaders, ExchangeError> {
    let (key, secret, passphrase) = credentials.complete()?;
    let secret = general_purpose::STANDARD.decode(secret)?;

    let timestamp = timestamp.to_string();
    let message = prehash(&timestamp, method, request_path, body);

    let mut mac = HmacSha256::new_from_slice(&secret)
        .map_err(|e| ExchangeError::InvalidCredentials(format!("Failed to create HMAC: {}", e)))?;
    mac.update(&message);
    let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

    Ok(AuthHeaders {
        key: key.to_string(),
        signature,
        timestamp,
        passphrase: passphrase.to_string(),
    })
}

/// Stateless signer holding the client's credentials
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn sign(
        &self,
        timestamp: u64,
        method: &str,
        request_path: &str,
        body: &[u8],
    ) -> Result<AuthHeaders, ExchangeError> {
        sign(&self.credentials, timestamp, method, request_path, body)
    }
}
