use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;

pub const LIVE_API_URL: &str = "https://api.pro.coinbase.com";
pub const SANDBOX_API_URL: &str = "https://api-public.sandbox.pro.coinbase.com";
pub const LIVE_WS_URL: &str = "wss://ws-feed.pro.coinbase.com";
pub const SANDBOX_WS_URL: &str = "wss://ws-feed-public.sandbox.pro.coinbase.com";

#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub api_key: Secret<String>,
    pub secret: Secret<String>,
    pub passphrase: Secret<String>,
    pub sandbox: bool,
    pub base_url: Option<String>,
    /// Sign requests with the exchange clock (`GET /time`) instead of the local one
    pub use_time_api: bool,
}

// Custom Serialize implementation - never expose secrets in serialization
impl Serialize for ExchangeConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ExchangeConfig", 6)?;
        state.serialize_field("api_key", "[REDACTED]")?;
        state.serialize_field("secret", "[REDACTED]")?;
        state.serialize_field("passphrase", "[REDACTED]")?;
        state.serialize_field("sandbox", &self.sandbox)?;
        state.serialize_field("base_url", &self.base_url)?;
        state.serialize_field("use_time_api", &self.use_time_api)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ExchangeConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ExchangeConfigHelper {
            #[serde(default)]
            api_key: String,
            #[serde(default)]
            secret: String,
            #[serde(default)]
            passphrase: String,
            #[serde(default)]
            sandbox: bool,
            base_url: Option<String>,
            #[serde(default)]
            use_time_api: bool,
        }

        let helper = ExchangeConfigHelper::deserialize(deserializer)?;
        Ok(Self {
            api_key: Secret::new(helper.api_key),
            secret: Secret::new(helper.secret),
            passphrase: Secret::new(helper.passphrase),
            sandbox: helper.sandbox,
            base_url: helper.base_url,
            use_time_api: helper.use_time_api,
        })
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self::read_only()
    }
}

impl ExchangeConfig {
    /// Create a new configuration with API credentials
    #[must_use]
    pub fn new(api_key: String, secret: String, passphrase: String) -> Self {
        Self {
            api_key: Secret::new(api_key),
            secret: Secret::new(secret),
            passphrase: Secret::new(passphrase),
            sandbox: false,
            base_url: None,
            use_time_api: false,
        }
    }

    /// Configuration for public endpoints only
    #[must_use]
    pub fn read_only() -> Self {
        Self::new(String::new(), String::new(), String::new())
    }

    /// Create configuration from environment variables
    ///
    /// Reads `{PREFIX}_API_KEY`, `{PREFIX}_SECRET` and `{PREFIX}_PASSPHRASE`.
    /// Missing credential variables are left empty; whether the set is complete
    /// is checked when a request is signed. Optional flags:
    /// `{PREFIX}_SANDBOX`, `{PREFIX}_BASE_URL`, `{PREFIX}_USE_TIME_API`.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let prefix = prefix.to_uppercase();
        let var = |name: &str| env::var(format!("{}_{}", prefix, name)).ok();

        let sandbox = parse_flag(&format!("{}_SANDBOX", prefix), var("SANDBOX"))?;
        let use_time_api = parse_flag(&format!("{}_USE_TIME_API", prefix), var("USE_TIME_API"))?;

        Ok(Self {
            api_key: Secret::new(var("API_KEY").unwrap_or_default()),
            secret: Secret::new(var("SECRET").unwrap_or_default()),
            passphrase: Secret::new(var("PASSPHRASE").unwrap_or_default()),
            sandbox,
            base_url: var("BASE_URL"),
            use_time_api,
        })
    }

    /// Load a `.env` file (if present) and then read the environment
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(()) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // no file, fall through to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    /// True if any credential field is set
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
            || !self.secret.expose_secret().is_empty()
            || !self.passphrase.expose_secret().is_empty()
    }

    #[must_use]
    pub const fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    #[must_use]
    pub const fn use_time_api(mut self, use_time_api: bool) -> Self {
        self.use_time_api = use_time_api;
        self
    }

    /// REST endpoint honouring the override and sandbox flag
    pub fn api_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            if self.sandbox {
                SANDBOX_API_URL.to_string()
            } else {
                LIVE_API_URL.to_string()
            }
        })
    }

    pub fn ws_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_WS_URL
        } else {
            LIVE_WS_URL
        }
    }

    /// Get API key (use carefully - exposes secret)
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Get secret (use carefully - exposes secret)
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }

    /// Get passphrase (use carefully - exposes secret)
    pub fn passphrase(&self) -> &str {
        self.passphrase.expose_secret()
    }
}

fn parse_flag(name: &str, value: Option<String>) -> Result<bool, ConfigError> {
    value.map_or(Ok(false), |raw| {
        raw.trim().parse::<bool>().map_err(|_| {
            ConfigError::InvalidConfiguration(format!("{} must be true or false, got {:?}", name, raw))
        })
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_redacts_secrets() {
        let config = ExchangeConfig::new(
            "key".to_string(),
            "c2VjcmV0".to_string(),
            "satoshi".to_string(),
        );
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("c2VjcmV0"));
        assert!(!json.contains("satoshi"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn test_api_url_selection() {
        assert_eq!(ExchangeConfig::read_only().api_url(), LIVE_API_URL);
        assert_eq!(
            ExchangeConfig::read_only().sandbox(true).api_url(),
            SANDBOX_API_URL
        );
        assert_eq!(
            ExchangeConfig::read_only()
                .sandbox(true)
                .base_url("http://localhost:9000".to_string())
                .api_url(),
            "http://localhost:9000"
        );
    }

    #[test]
    fn test_from_env_reads_prefixed_vars() {
        env::set_var("CBPRO_CFG_TEST_API_KEY", "key");
        env::set_var("CBPRO_CFG_TEST_SECRET", "c2VjcmV0");
        env::set_var("CBPRO_CFG_TEST_SANDBOX", "true");

        let config = ExchangeConfig::from_env("cbpro_cfg_test").unwrap();
        assert_eq!(config.api_key(), "key");
        assert_eq!(config.secret(), "c2VjcmV0");
        assert_eq!(config.passphrase(), "");
        assert!(config.sandbox);
        assert!(!config.use_time_api);
        assert!(config.has_credentials());
    }

    #[test]
    fn test_from_env_rejects_bad_flag() {
        env::set_var("CBPRO_BADFLAG_TEST_USE_TIME_API", "sometimes");
        let result = ExchangeConfig::from_env("cbpro_badflag_test");
        assert!(matches!(result, Err(ConfigError::InvalidConfiguration(_))));
    }
}
