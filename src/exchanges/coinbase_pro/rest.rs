use crate::core::errors::ExchangeError;
use crate::core::kernel::{Page, PageRequest, RestClient};
use crate::exchanges::coinbase_pro::types::{
    Account, AccountActivity, Candle, CreateOrder, Currency, Order, OrderBook, Product,
    ServerTime, Stats, Ticker, Trade,
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Coinbase Pro REST endpoints, one method per call
#[derive(Debug, Clone)]
pub struct CoinbaseProRest<R: RestClient> {
    rest_client: R,
}

impl<R: RestClient> CoinbaseProRest<R> {
    pub fn new(rest_client: R) -> Self {
        Self { rest_client }
    }

    pub fn client(&self) -> &R {
        &self.rest_client
    }

    pub async fn get_products(&self) -> Result<Vec<Product>, ExchangeError> {
        self.rest_client.get_json("/products", &[], false).await
    }

    pub async fn get_ticker(&self, product_id: &str) -> Result<Ticker, ExchangeError> {
        let endpoint = format!("/products/{}/ticker", product_id);
        self.rest_client.get_json(&endpoint, &[], false).await
    }

    pub async fn get_trades(
        &self,
        product_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Trade>, ExchangeError> {
        let endpoint = format!("/products/{}/trades", product_id);
        self.rest_client.get_page(&endpoint, &[], page, false).await
    }

    /// Level 1 is the best bid/ask, level 2 the top 50 aggregated levels,
    /// level 3 the full non-aggregated book
    pub async fn get_order_book(
        &self,
        product_id: &str,
        level: u8,
    ) -> Result<OrderBook, ExchangeError> {
        if !(1..=3).contains(&level) {
            return Err(ExchangeError::InvalidParameters(format!(
                "Order book level must be 1, 2 or 3, got {}",
                level
            )));
        }

        let endpoint = format!("/products/{}/book", product_id);
        let level = level.to_string();
        self.rest_client
            .get_json(&endpoint, &[("level", level.as_str())], false)
            .await
    }

    /// Historic rates between `start` and `end`, bucketed by `granularity` seconds
    pub async fn get_candles(
        &self,
        product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let endpoint = format!("/products/{}/candles", product_id);
        let start = start.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let end = end.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let granularity = granularity.to_string();
        let query_params = [
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("granularity", granularity.as_str()),
        ];

        self.rest_client
            .get_json(&endpoint, &query_params, false)
            .await
    }

    pub async fn get_stats(&self, product_id: &str) -> Result<Stats, ExchangeError> {
        let endpoint = format!("/products/{}/stats", product_id);
        self.rest_client.get_json(&endpoint, &[], false).await
    }

    pub async fn get_currencies(&self) -> Result<Vec<Currency>, ExchangeError> {
        self.rest_client.get_json("/currencies", &[], false).await
    }

    pub async fn get_time(&self) -> Result<ServerTime, ExchangeError> {
        self.rest_client.get_json("/time", &[], false).await
    }

    /// `GET /orders` with one `status` parameter per entry of `statuses`
    pub async fn get_orders(
        &self,
        statuses: &[&str],
        product_id: Option<&str>,
        page: &PageRequest,
    ) -> Result<Page<Order>, ExchangeError> {
        let mut query_params: Vec<(&str, &str)> =
            statuses.iter().map(|status| ("status", *status)).collect();
        if let Some(product_id) = product_id {
            query_params.push(("product_id", product_id));
        }

        self.rest_client
            .get_page("/orders", &query_params, page, true)
            .await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        let endpoint = format!("/orders/{}", order_id);
        self.rest_client.get_json(&endpoint, &[], true).await
    }

    pub async fn cancel_all_orders(
        &self,
        product_id: Option<&str>,
    ) -> Result<Vec<Uuid>, ExchangeError> {
        let query_params: Vec<(&str, &str)> = product_id
            .map(|product_id| vec![("product_id", product_id)])
            .unwrap_or_default();

        self.rest_client
            .delete_json("/orders", &query_params, true)
            .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<Vec<Uuid>, ExchangeError> {
        let endpoint = format!("/orders/{}", order_id);
        self.rest_client.delete_json(&endpoint, &[], true).await
    }

    pub async fn place_order(&self, order: &CreateOrder) -> Result<Order, ExchangeError> {
        self.rest_client.post_json("/orders", order, true).await
    }

    pub async fn get_accounts(&self) -> Result<Vec<Account>, ExchangeError> {
        self.rest_client.get_json("/accounts", &[], true).await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, ExchangeError> {
        let endpoint = format!("/accounts/{}", account_id);
        self.rest_client.get_json(&endpoint, &[], true).await
    }

    pub async fn get_account_history(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> Result<Page<AccountActivity>, ExchangeError> {
        let endpoint = format!("/accounts/{}/ledger", account_id);
        self.rest_client.get_page(&endpoint, &[], page, true).await
    }
}
