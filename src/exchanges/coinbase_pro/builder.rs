use crate::core::config::{ConfigError, ExchangeConfig};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    Credentials, ExchangeClock, ReqwestRest, RequestSigner, RestClientBuilder, RestClientConfig,
    SystemClock, TimeSource, TungsteniteWs, WsConfig,
};
use crate::exchanges::coinbase_pro::{codec::CoinbaseProCodec, connector::CoinbaseProConnector};
use std::sync::Arc;
use std::time::Duration;

pub const EXCHANGE_NAME: &str = "coinbase_pro";

/// Builder for creating Coinbase Pro connectors
///
/// Credentials are attached whenever any of key, secret or passphrase is set;
/// an incomplete set is reported by the first authenticated call.
pub struct CoinbaseProBuilder {
    config: ExchangeConfig,
    ws_url: Option<String>,
    rest_timeout: u64,
    user_agent: Option<String>,
    ws_connect_timeout_ms: u64,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl Default for CoinbaseProBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinbaseProBuilder {
    pub fn new() -> Self {
        Self {
            config: ExchangeConfig::read_only(),
            ws_url: None,
            rest_timeout: 30,
            user_agent: None,
            ws_connect_timeout_ms: WsConfig::default().connect_timeout_ms,
            time_source: None,
        }
    }

    pub fn with_config(mut self, config: ExchangeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    pub fn with_credentials(mut self, api_key: String, secret: String, passphrase: String) -> Self {
        let config = ExchangeConfig::new(api_key, secret, passphrase)
            .sandbox(self.config.sandbox)
            .use_time_api(self.config.use_time_api);
        self.config = match self.config.base_url.take() {
            Some(base_url) => config.base_url(base_url),
            None => config,
        };
        self
    }

    /// Override the REST endpoint (e.g. a local mock)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.config.base_url = Some(base_url);
        self
    }

    /// Override the feed endpoint
    pub fn with_ws_url(mut self, ws_url: String) -> Self {
        self.ws_url = Some(ws_url);
        self
    }

    /// Set REST client timeout in seconds
    pub fn with_rest_timeout(mut self, timeout: u64) -> Self {
        self.rest_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    pub fn with_ws_connect_timeout(mut self, timeout: Duration) -> Self {
        self.ws_connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Timestamp signed requests with `GET /time` instead of the local clock
    pub fn with_exchange_time(mut self, enabled: bool) -> Self {
        self.config.use_time_api = enabled;
        self
    }

    /// Use a custom clock; takes precedence over `with_exchange_time`
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    fn rest_config(&self) -> RestClientConfig {
        let rest_config = RestClientConfig::new(self.config.api_url(), EXCHANGE_NAME.to_string())
            .with_timeout(self.rest_timeout);
        match &self.user_agent {
            Some(user_agent) => rest_config.with_user_agent(user_agent.clone()),
            None => rest_config,
        }
    }

    fn signer(&self) -> Option<Arc<RequestSigner>> {
        self.config
            .has_credentials()
            .then(|| Arc::new(RequestSigner::new(Credentials::from_config(&self.config))))
    }

    fn ws_url(&self) -> String {
        self.ws_url
            .clone()
            .unwrap_or_else(|| self.config.ws_url().to_string())
    }

    fn build_rest(&self) -> Result<ReqwestRest, ExchangeError> {
        let mut rest_builder =
            RestClientBuilder::new(self.rest_config()).with_exchange_time(self.config.use_time_api);

        if let Some(signer) = self.signer() {
            rest_builder = rest_builder.with_signer(signer);
        }
        if let Some(time_source) = &self.time_source {
            rest_builder = rest_builder.with_time_source(time_source.clone());
        }

        rest_builder.build()
    }

    fn ws_clock(&self) -> Result<Arc<dyn TimeSource>, ExchangeError> {
        if let Some(time_source) = &self.time_source {
            return Ok(time_source.clone());
        }
        if !self.config.use_time_api {
            return Ok(Arc::new(SystemClock));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.rest_timeout))
            .build()
            .map_err(|e| {
                ConfigError::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
            })?;
        Ok(Arc::new(ExchangeClock::new(client, &self.config.api_url())))
    }

    /// Build a REST-only connector
    pub fn build_rest_only(self) -> Result<CoinbaseProConnector<ReqwestRest, ()>, ExchangeError> {
        let rest = self.build_rest()?;
        Ok(CoinbaseProConnector::new_without_ws(rest))
    }

    /// Build a connector with an unopened feed session
    pub fn build_with_ws(
        self,
    ) -> Result<CoinbaseProConnector<ReqwestRest, TungsteniteWs<CoinbaseProCodec>>, ExchangeError>
    {
        let rest = self.build_rest()?;

        let mut ws = TungsteniteWs::new(self.ws_url(), EXCHANGE_NAME.to_string(), CoinbaseProCodec)
            .with_config(WsConfig {
                connect_timeout_ms: self.ws_connect_timeout_ms,
            })
            .with_time_source(self.ws_clock()?);
        if let Some(signer) = self.signer() {
            ws = ws.with_signer(signer);
        }

        Ok(CoinbaseProConnector::new_with_ws(rest, ws))
    }
}

/// Create a REST-only connector from a configuration
pub fn build_connector(
    config: ExchangeConfig,
) -> Result<CoinbaseProConnector<ReqwestRest, ()>, ExchangeError> {
    CoinbaseProBuilder::new().with_config(config).build_rest_only()
}

/// Create a connector with a feed session from a configuration
pub fn build_connector_with_websocket(
    config: ExchangeConfig,
) -> Result<CoinbaseProConnector<ReqwestRest, TungsteniteWs<CoinbaseProCodec>>, ExchangeError> {
    CoinbaseProBuilder::new().with_config(config).build_with_ws()
}
