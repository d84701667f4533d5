/// Kernel - exchange-agnostic transport layer
///
/// Everything here is independent of the endpoint surface:
///
/// ## Transport Layer
/// - `RestClient`: HTTP client interface returning status, headers and body
/// - `WsSession`: single-shot WebSocket session driven by a `WsCodec`
///
/// ## Authentication
/// - `RequestSigner`: `CB-ACCESS-*` header generation
/// - `TimeSource`: where request timestamps come from
///
/// ## Pagination
/// - `PageRequest` / `Page<T>`: cursor parameters and results
/// - `paginate`: lazy multi-page item stream
///
/// # Example
/// ```rust,no_run
/// use cbpro::core::kernel::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let signer = Arc::new(RequestSigner::new(Credentials::new(
///     "key",
///     "dGVzdC1zZWNyZXQ=",
///     "passphrase",
/// )));
/// let rest = RestClientBuilder::new(RestClientConfig::new(
///     "https://api.pro.coinbase.com".to_string(),
///     "coinbase_pro".to_string(),
/// ))
/// .with_signer(signer)
/// .build()?;
///
/// let page: Page<serde_json::Value> = rest
///     .get_page("/products/BTC-USD/trades", &[], &PageRequest::new().limit(50), false)
///     .await?;
/// println!("{} trades, older page at {:?}", page.len(), page.after());
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod pagination;
pub mod rest;
pub mod signer;
pub mod time;
pub mod ws;

pub use codec::WsCodec;
pub use pagination::{
    paginate, paginate_until, parse_page, Cursor, Page, PageRequest, MAX_PAGE_LIMIT,
};
pub use rest::{cancellable, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig, RestResponse};
pub use signer::{sign, AuthHeaders, Credentials, RequestSigner};
pub use time::{ExchangeClock, FixedClock, SystemClock, TimeSource};
pub use ws::{TungsteniteWs, WsConfig, WsSession};
