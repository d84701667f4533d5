use crate::core::errors::{ExchangeError, TransportError};
use crate::core::kernel::pagination::{parse_page, Page, PageRequest};
use crate::core::kernel::signer::{AuthHeaders, RequestSigner};
use crate::core::kernel::time::{ExchangeClock, SystemClock, TimeSource};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{instrument, trace};

/// Status, headers and body of one HTTP exchange
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-2xx response into `TransportError::Status`
    pub fn error_for_status(self) -> Result<Self, ExchangeError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                code: self.status,
                message: String::from_utf8_lossy(&self.body).into_owned(),
            }
            .into())
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ExchangeError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e))
        })
    }

    pub fn page<T: DeserializeOwned>(&self) -> Result<Page<T>, ExchangeError> {
        parse_page(&self.body, &self.headers)
    }
}

/// HTTP transport used by the endpoint layer
///
/// Implementors only provide [`RestClient::send`]; it must return the response
/// for any status code and leave retries to the caller.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Send one request, signing it when `authenticated` is set
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `endpoint` - Path below the API root, starting with `/`
    /// * `query_params` - Query pairs in the order they must appear on the wire
    /// * `body` - Raw JSON body, empty for none
    /// * `authenticated` - Whether to attach `CB-ACCESS-*` headers
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
        authenticated: bool,
    ) -> Result<RestResponse, ExchangeError>;

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.send(Method::GET, endpoint, query_params, &[], authenticated)
            .await?
            .error_for_status()?
            .json()
    }

    /// GET a list endpoint, appending the page parameters after `query_params`
    async fn get_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        page: &PageRequest,
        authenticated: bool,
    ) -> Result<Page<T>, ExchangeError> {
        let page_query = page.to_query();
        let mut query: Vec<(&str, &str)> = query_params.to_vec();
        query.extend(page_query.iter().map(|(k, v)| (*k, v.as_str())));

        self.send(Method::GET, endpoint, &query, &[], authenticated)
            .await?
            .error_for_status()?
            .page()
    }

    async fn post_json<B, T>(
        &self,
        endpoint: &str,
        body: &B,
        authenticated: bool,
    ) -> Result<T, ExchangeError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let body_bytes = serde_json::to_vec(body).map_err(|e| {
            ExchangeError::SerializationError(format!("Failed to serialize request body: {}", e))
        })?;

        self.send(Method::POST, endpoint, &[], &body_bytes, authenticated)
            .await?
            .error_for_status()?
            .json()
    }

    async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query_params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.send(Method::DELETE, endpoint, query_params, &[], authenticated)
            .await?
            .error_for_status()?
            .json()
    }
}

/// Race `request` against `cancel`
///
/// If `cancel` resolves first the request future is dropped, which aborts the
/// HTTP call, and `ExchangeError::Cancelled` is returned.
pub async fn cancellable<T, F, C>(request: F, cancel: C) -> Result<T, ExchangeError>
where
    F: Future<Output = Result<T, ExchangeError>>,
    C: Future,
{
    tokio::select! {
        biased;
        _ = cancel => Err(ExchangeError::Cancelled),
        result = request => result,
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: concat!("cbpro/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<RequestSigner>>,
    time_source: Option<Arc<dyn TimeSource>>,
    use_exchange_time: bool,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
            time_source: None,
            use_exchange_time: false,
        }
    }

    /// Set the signer for authenticated requests
    pub fn with_signer(mut self, signer: Arc<RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Use a custom clock for request timestamps
    pub fn with_time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Timestamp signed requests with the exchange's `/time` endpoint
    pub fn with_exchange_time(mut self, enabled: bool) -> Self {
        self.use_exchange_time = enabled;
        self
    }

    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::ConfigError(crate::core::config::ConfigError::InvalidConfiguration(
                    format!("Failed to build HTTP client: {}", e),
                ))
            })?;

        let clock: Arc<dyn TimeSource> = match self.time_source {
            Some(time_source) => time_source,
            None if self.use_exchange_time => {
                Arc::new(ExchangeClock::new(client.clone(), &self.config.base_url))
            }
            None => Arc::new(SystemClock),
        };

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
            clock,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<RequestSigner>>,
    clock: Arc<dyn TimeSource>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn new(
        base_url: String,
        exchange_name: String,
        signer: Option<Arc<RequestSigner>>,
    ) -> Result<Self, ExchangeError> {
        let mut builder = RestClientBuilder::new(RestClientConfig::new(base_url, exchange_name));
        if let Some(signer) = signer {
            builder = builder.with_signer(signer);
        }
        builder.build()
    }

    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Sign `method` + the path and query of `url` + `body` with one timestamp
    pub async fn auth_headers(
        &self,
        method: &Method,
        url: &Url,
        body: &[u8],
    ) -> Result<AuthHeaders, ExchangeError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ExchangeError::InvalidCredentials(
                "Authenticated endpoint called without API credentials".to_string(),
            )
        })?;

        let timestamp = self.clock.now().await?;
        signer.sign(timestamp, method.as_str(), &request_path(url), body)
    }
}

/// Join base URL, endpoint and query pairs, keeping pair order
pub fn build_url(
    base_url: &str,
    endpoint: &str,
    query_params: &[(&str, &str)],
) -> Result<Url, ExchangeError> {
    let raw = format!("{}{}", base_url.trim_end_matches('/'), endpoint);
    let mut url = Url::parse(&raw)
        .map_err(|e| ExchangeError::InvalidParameters(format!("Invalid URL {}: {}", raw, e)))?;

    if !query_params.is_empty() {
        url.query_pairs_mut().extend_pairs(query_params.iter());
    }

    Ok(url)
}

/// Path plus query string exactly as it goes on the wire
pub fn request_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, query_params, body), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %endpoint))]
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        query_params: &[(&str, &str)],
        body: &[u8],
        authenticated: bool,
    ) -> Result<RestResponse, ExchangeError> {
        let url = build_url(&self.config.base_url, endpoint, query_params)?;

        let auth = if authenticated {
            Some(self.auth_headers(&method, &url, body).await?)
        } else {
            None
        };

        let mut request = self.client.request(method, url);
        if let Some(auth) = &auth {
            for (name, value) in auth.iter() {
                request = request.header(name, value);
            }
        }

        if !body.is_empty() {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExchangeError::network(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::network(format!("Failed to read response body: {}", e)))?
            .to_vec();

        trace!(status, "Response body: {}", String::from_utf8_lossy(&body));

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::signer::Credentials;
    use crate::core::kernel::time::FixedClock;
    use reqwest::header::HeaderValue;
    use std::time::Duration;

    fn signed_rest(clock: Arc<dyn TimeSource>) -> ReqwestRest {
        let signer = RequestSigner::new(Credentials::new("key", "dGVzdC1zZWNyZXQ=", "satoshi"));
        RestClientBuilder::new(RestClientConfig::new(
            "https://api.pro.coinbase.com".to_string(),
            "coinbase_pro".to_string(),
        ))
        .with_signer(Arc::new(signer))
        .with_time_source(clock)
        .build()
        .unwrap()
    }

    #[test]
    fn test_build_url_keeps_query_order() {
        let url = build_url(
            "https://api.pro.coinbase.com/",
            "/products/BTC-USD/trades",
            &[("limit", "50"), ("before", "27"), ("after", "28")],
        )
        .unwrap();

        assert_eq!(
            request_path(&url),
            "/products/BTC-USD/trades?limit=50&before=27&after=28"
        );
    }

    #[test]
    fn test_build_url_without_query_has_no_question_mark() {
        let url = build_url("https://api.pro.coinbase.com", "/accounts", &[]).unwrap();
        assert_eq!(request_path(&url), "/accounts");
    }

    #[test]
    fn test_build_url_encodes_values() {
        let url = build_url(
            "https://api.pro.coinbase.com",
            "/products/BTC-USD/candles",
            &[("start", "2018-11-26T07:00:00+00:00")],
        )
        .unwrap();
        assert_eq!(
            url.query(),
            Some("start=2018-11-26T07%3A00%3A00%2B00%3A00")
        );
    }

    #[tokio::test]
    async fn test_auth_headers_sign_path_with_query() {
        let rest = signed_rest(Arc::new(FixedClock(1_544_805_953)));
        let url = build_url(&rest.config().base_url, "/orders", &[("status", "open")]).unwrap();

        let headers = rest.auth_headers(&Method::GET, &url, b"").await.unwrap();

        assert_eq!(headers.timestamp, "1544805953");
        assert_eq!(
            headers.signature,
            "XYF2wEShLk4gbmlXJgxeXCX+zOpuFc+9i+7SLHX5+EI="
        );
    }

    struct BrokenClock;

    #[async_trait]
    impl TimeSource for BrokenClock {
        async fn now(&self) -> Result<u64, ExchangeError> {
            Err(ExchangeError::ClockUnavailable("time endpoint down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_clock_failure_propagates() {
        let rest = signed_rest(Arc::new(BrokenClock));
        let url = build_url(&rest.config().base_url, "/accounts", &[]).unwrap();

        let result = rest.auth_headers(&Method::GET, &url, b"").await;
        assert!(matches!(result, Err(ExchangeError::ClockUnavailable(_))));
    }

    #[tokio::test]
    async fn test_authenticated_call_without_signer() {
        let rest = ReqwestRest::new(
            "https://api.pro.coinbase.com".to_string(),
            "coinbase_pro".to_string(),
            None,
        )
        .unwrap();

        let result = rest.send(Method::GET, "/accounts", &[], &[], true).await;
        assert!(matches!(result, Err(ExchangeError::InvalidCredentials(_))));
    }

    #[test]
    fn test_error_for_status_passes_body_through() {
        let response = RestResponse {
            status: 401,
            headers: HeaderMap::new(),
            body: br#"{"message":"invalid signature"}"#.to_vec(),
        };

        match response.error_for_status() {
            Err(ExchangeError::Transport(TransportError::Status { code, message })) => {
                assert_eq!(code, 401);
                assert_eq!(message, r#"{"message":"invalid signature"}"#);
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_page() {
        let mut headers = HeaderMap::new();
        headers.insert("cb-after", HeaderValue::from_static("42"));
        let response = RestResponse {
            status: 200,
            headers,
            body: b"[1,2,3]".to_vec(),
        };

        let page: Page<u32> = response.page().unwrap();
        assert_eq!(page.items(), &[1, 2, 3]);
        assert_eq!(page.after().map(|c| c.as_str()), Some("42"));
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancel() {
        let result: Result<u32, _> = cancellable(
            async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(1)
            },
            async {},
        )
        .await;
        assert!(matches!(result, Err(ExchangeError::Cancelled)));

        let result = cancellable(async { Ok(7) }, std::future::pending::<()>()).await;
        assert_eq!(result.unwrap(), 7);
    }
}
