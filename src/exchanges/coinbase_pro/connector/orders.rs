use crate::core::errors::ExchangeError;
use crate::core::kernel::{Page, PageRequest, RestClient};
use crate::exchanges::coinbase_pro::rest::CoinbaseProRest;
use crate::exchanges::coinbase_pro::types::{
    AmountType, CreateOrder, GoodTillTime, Order, OrderSide, TimeInForce,
};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

/// Status filter used when none is given
pub const DEFAULT_ORDER_STATUS: &str = "all";

/// Split a status filter such as `"open, pending"` into its entries
pub fn split_statuses(status: &str) -> Vec<&str> {
    status
        .split(|c: char| c == ' ' || c == ',')
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Authenticated order endpoints
#[derive(Debug, Clone)]
pub struct Orders<R: RestClient> {
    rest: CoinbaseProRest<R>,
}

impl<R: RestClient + Clone> Orders<R> {
    pub fn new(rest: &R) -> Self {
        Self {
            rest: CoinbaseProRest::new(rest.clone()),
        }
    }
}

impl<R: RestClient> Orders<R> {
    /// List orders
    ///
    /// # Arguments
    /// * `status` - Comma or space separated statuses (`open`, `pending`,
    ///   `active`, `all`); `None` means `all`
    /// * `product_id` - Restrict to one product
    /// * `page` - Cursor parameters
    pub async fn get_all_orders(
        &self,
        status: Option<&str>,
        product_id: Option<&str>,
        page: &PageRequest,
    ) -> Result<Page<Order>, ExchangeError> {
        let statuses = split_statuses(status.unwrap_or(DEFAULT_ORDER_STATUS));
        self.rest.get_orders(&statuses, product_id, page).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, ExchangeError> {
        self.rest.get_order(order_id).await
    }

    /// Best-effort cancel of every open order, or only those of `product_id`
    ///
    /// Returns the ids of the cancelled orders.
    pub async fn cancel_all_orders(
        &self,
        product_id: Option<&str>,
    ) -> Result<Vec<Uuid>, ExchangeError> {
        self.rest.cancel_all_orders(product_id).await
    }

    pub async fn cancel_order_by_id(&self, order_id: &str) -> Result<Vec<Uuid>, ExchangeError> {
        self.rest.cancel_order(order_id).await
    }

    pub async fn place_market_order(
        &self,
        side: OrderSide,
        product_id: &str,
        amount: Decimal,
        amount_type: AmountType,
        client_oid: Option<Uuid>,
    ) -> Result<Order, ExchangeError> {
        let order = CreateOrder::market(side, product_id, amount, amount_type)
            .with_client_oid(client_oid);
        self.place_order(&order).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn place_limit_order(
        &self,
        side: OrderSide,
        product_id: &str,
        size: Decimal,
        limit_price: Decimal,
        time_in_force: TimeInForce,
        post_only: bool,
        client_oid: Option<Uuid>,
    ) -> Result<Order, ExchangeError> {
        let order = CreateOrder::limit(side, product_id, size, limit_price)
            .with_time_in_force(time_in_force)
            .with_post_only(post_only)
            .with_client_oid(client_oid);
        self.place_order(&order).await
    }

    /// Limit order with `time_in_force = GTT`, cancelled after `cancel_after`
    #[allow(clippy::too_many_arguments)]
    pub async fn place_limit_order_good_till(
        &self,
        side: OrderSide,
        product_id: &str,
        size: Decimal,
        limit_price: Decimal,
        cancel_after: GoodTillTime,
        post_only: bool,
        client_oid: Option<Uuid>,
    ) -> Result<Order, ExchangeError> {
        let order = CreateOrder::limit(side, product_id, size, limit_price)
            .with_cancel_after(cancel_after)
            .with_post_only(post_only)
            .with_client_oid(client_oid);
        self.place_order(&order).await
    }

    /// Market order triggered at `stop_price`
    ///
    /// Buys use a stop `entry`, sells a stop `loss`.
    pub async fn place_stop_order(
        &self,
        side: OrderSide,
        product_id: &str,
        amount: Decimal,
        amount_type: AmountType,
        stop_price: Decimal,
        client_oid: Option<Uuid>,
    ) -> Result<Order, ExchangeError> {
        let order = CreateOrder::market(side, product_id, amount, amount_type)
            .with_stop(stop_price)
            .with_client_oid(client_oid);
        self.place_order(&order).await
    }

    /// Limit order at `limit_price` that only rests once `stop_price` trades
    pub async fn place_stop_limit_order(
        &self,
        side: OrderSide,
        product_id: &str,
        size: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
        client_oid: Option<Uuid>,
    ) -> Result<Order, ExchangeError> {
        let order = CreateOrder::limit(side, product_id, size, limit_price)
            .with_stop(stop_price)
            .with_client_oid(client_oid);
        self.place_order(&order).await
    }

    #[instrument(skip(self, order), fields(exchange = "coinbase_pro", product_id = %order.product_id, side = ?order.side))]
    pub async fn place_order(&self, order: &CreateOrder) -> Result<Order, ExchangeError> {
        self.rest.place_order(order).await
    }
}
