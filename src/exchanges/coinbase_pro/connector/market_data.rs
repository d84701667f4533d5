use crate::core::errors::ExchangeError;
use crate::core::kernel::{paginate, paginate_until, Page, PageRequest, RestClient};
use crate::exchanges::coinbase_pro::rest::CoinbaseProRest;
use crate::exchanges::coinbase_pro::types::{
    Candle, Currency, OrderBook, Product, ServerTime, Stats, Ticker, Trade,
};
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::BoxStream;
use std::future::Future;

/// Public market data endpoints
#[derive(Debug, Clone)]
pub struct MarketData<R: RestClient> {
    rest: CoinbaseProRest<R>,
}

impl<R: RestClient + Clone> MarketData<R> {
    pub fn new(rest: &R) -> Self {
        Self {
            rest: CoinbaseProRest::new(rest.clone()),
        }
    }
}

impl<R: RestClient> MarketData<R> {
    pub async fn get_products(&self) -> Result<Vec<Product>, ExchangeError> {
        self.rest.get_products().await
    }

    pub async fn get_ticker(&self, product_id: &str) -> Result<Ticker, ExchangeError> {
        self.rest.get_ticker(product_id).await
    }

    /// One page of recent trades, newest first
    pub async fn get_trades(
        &self,
        product_id: &str,
        page: &PageRequest,
    ) -> Result<Page<Trade>, ExchangeError> {
        self.rest.get_trades(product_id, page).await
    }

    pub async fn get_order_book(
        &self,
        product_id: &str,
        level: u8,
    ) -> Result<OrderBook, ExchangeError> {
        self.rest.get_order_book(product_id, level).await
    }

    pub async fn get_candles(
        &self,
        product_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.rest
            .get_candles(product_id, start, end, granularity)
            .await
    }

    pub async fn get_stats(&self, product_id: &str) -> Result<Stats, ExchangeError> {
        self.rest.get_stats(product_id).await
    }

    pub async fn get_currencies(&self) -> Result<Vec<Currency>, ExchangeError> {
        self.rest.get_currencies().await
    }

    pub async fn get_time(&self) -> Result<ServerTime, ExchangeError> {
        self.rest.get_time().await
    }
}

impl<R: RestClient + Clone + 'static> MarketData<R> {
    /// Walk trades from `first` toward older ones, at most `max_pages` pages
    pub fn stream_trades(
        &self,
        product_id: &str,
        first: PageRequest,
        max_pages: Option<usize>,
    ) -> BoxStream<'static, Result<Trade, ExchangeError>> {
        paginate(first, max_pages, self.trade_fetcher(product_id))
    }

    /// [`MarketData::stream_trades`] that stops once `cancel` resolves
    pub fn stream_trades_until<C>(
        &self,
        product_id: &str,
        first: PageRequest,
        max_pages: Option<usize>,
        cancel: C,
    ) -> BoxStream<'static, Result<Trade, ExchangeError>>
    where
        C: Future + Send + 'static,
        C::Output: Send,
    {
        paginate_until(first, max_pages, self.trade_fetcher(product_id), cancel)
    }

    fn trade_fetcher(
        &self,
        product_id: &str,
    ) -> impl FnMut(PageRequest) -> BoxFuture<'static, Result<Page<Trade>, ExchangeError>>
           + Send
           + 'static {
        let rest = self.rest.clone();
        let product_id = product_id.to_string();
        move |request: PageRequest| {
            let rest = rest.clone();
            let product_id = product_id.clone();
            async move { rest.get_trades(&product_id, &request).await }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::coinbase_pro::connector::test_support::MockRest;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_order_book_level_is_validated() {
        let mock = MockRest::default();
        let market = MarketData::new(&mock);

        for level in [0, 4] {
            let result = market.get_order_book("BTC-USD", level).await;
            assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
        }
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_order_book_request() {
        let mock = MockRest::default();
        mock.respond_json(
            200,
            r#"{"sequence":3,"bids":[["295.96","4.39088265",2]],"asks":[["295.97","25.23542881",12]]}"#,
        );
        let market = MarketData::new(&mock);

        let book = market.get_order_book("BTC-USD", 2).await.unwrap();

        assert_eq!(book.sequence, 3);
        let request = &mock.requests()[0];
        assert_eq!(request.endpoint, "/products/BTC-USD/book");
        assert_eq!(request.query_string(), "level=2");
        assert!(!request.authenticated);
    }

    #[tokio::test]
    async fn test_candles_use_iso_timestamps() {
        let mock = MockRest::default();
        mock.respond_json(200, "[[1543219200,3800,3850,3810,3840,12.5]]");
        let market = MarketData::new(&mock);

        let start = Utc.with_ymd_and_hms(2018, 11, 26, 7, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2018, 11, 26, 8, 0, 0).unwrap();
        let candles = market
            .get_candles("BTC-USD", start, end, 60)
            .await
            .unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(
            mock.requests()[0].query_string(),
            "start=2018-11-26T07:00:00Z&end=2018-11-26T08:00:00Z&granularity=60"
        );
    }

    #[tokio::test]
    async fn test_error_status_is_not_reinterpreted() {
        let mock = MockRest::default();
        mock.respond_json(404, r#"{"message":"NotFound"}"#);
        let market = MarketData::new(&mock);

        let err = market.get_ticker("NOPE-USD").await.unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(err.to_string().contains("NotFound"));
    }
}
