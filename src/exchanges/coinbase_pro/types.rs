use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use crate::core::kernel::time::ServerTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    Stop,
}

/// Lifetime policy for limit orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    #[serde(rename = "GTC")]
    GoodTillCanceled,
    /// Requires `cancel_after`
    #[serde(rename = "GTT")]
    GoodTillTime,
    #[serde(rename = "IOC")]
    ImmediateOrCancel,
    #[serde(rename = "FOK")]
    FillOrKill,
}

/// `cancel_after` window for `GTT` orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoodTillTime {
    Min,
    Hour,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    /// Triggers at or below the stop price
    Loss,
    /// Triggers at or above the stop price
    Entry,
}

impl StopType {
    /// `entry` for buys, `loss` for sells
    pub fn for_side(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Self::Entry,
            OrderSide::Sell => Self::Loss,
        }
    }
}

/// Whether a market order amount is denominated in base (`size`) or quote (`funds`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AmountType {
    #[default]
    UseSize,
    UseFunds,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Received,
    Open,
    Pending,
    Active,
    Done,
    Rejected,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Product {
    pub id: String, // e.g. BTC-USD
    pub base_currency: String,
    pub quote_currency: String,
    pub base_min_size: Option<Decimal>,
    pub base_max_size: Option<Decimal>,
    pub quote_increment: Option<Decimal>,
    pub base_increment: Option<Decimal>,
    pub display_name: Option<String>,
    pub min_market_funds: Option<Decimal>,
    pub max_market_funds: Option<Decimal>,
    #[serde(default)]
    pub margin_enabled: bool,
    #[serde(default)]
    pub post_only: bool,
    #[serde(default)]
    pub limit_only: bool,
    #[serde(default)]
    pub cancel_only: bool,
    pub status: Option<String>, // online, offline, delisted
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Ticker {
    pub trade_id: u64,
    pub price: Decimal,
    pub size: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub volume: Decimal,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Trade {
    pub time: DateTime<Utc>,
    pub trade_id: u64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: OrderSide, // maker side
}

/// One price level of the order book
///
/// Levels 1 and 2 carry the number of orders at the price, level 3 carries
/// one entry per order with its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(Decimal, Decimal, Value)")]
pub struct OrderBookEntry {
    pub price: Decimal,
    pub size: Decimal,
    pub order_count: Option<u64>,
    pub order_id: Option<String>,
}

impl From<(Decimal, Decimal, Value)> for OrderBookEntry {
    fn from((price, size, third): (Decimal, Decimal, Value)) -> Self {
        let (order_count, order_id) = match third {
            Value::Number(n) => (n.as_u64(), None),
            Value::String(s) => (None, Some(s)),
            _ => (None, None),
        };
        Self {
            price,
            size,
            order_count,
            order_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrderBook {
    pub sequence: u64,
    pub bids: Vec<OrderBookEntry>,
    pub asks: Vec<OrderBookEntry>,
}

/// One bucket of `/products/{id}/candles`, sent as
/// `[time, low, high, open, close, volume]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i64, Decimal, Decimal, Decimal, Decimal, Decimal)")]
pub struct Candle {
    pub time: i64, // bucket start, Unix seconds
    pub low: Decimal,
    pub high: Decimal,
    pub open: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.time, 0).single()
    }
}

impl From<(i64, Decimal, Decimal, Decimal, Decimal, Decimal)> for Candle {
    fn from(
        (time, low, high, open, close, volume): (i64, Decimal, Decimal, Decimal, Decimal, Decimal),
    ) -> Self {
        Self {
            time,
            low,
            high,
            open,
            close,
            volume,
        }
    }
}

/// 24 hour statistics for a product
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Stats {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub last: Option<Decimal>,
    pub volume_30day: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Currency {
    pub id: String,
    pub name: String,
    pub min_size: Decimal,
    pub status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub product_id: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub size: Option<Decimal>,
    pub funds: Option<Decimal>,
    pub specified_funds: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
    #[serde(default)]
    pub post_only: bool,
    pub stp: Option<String>, // self-trade prevention flag
    pub stop: Option<StopType>,
    pub stop_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    pub done_reason: Option<String>,
    pub fill_fees: Option<Decimal>,
    pub filled_size: Option<Decimal>,
    pub executed_value: Option<Decimal>,
    pub status: OrderStatus,
    #[serde(default)]
    pub settled: bool,
}

/// Body of `POST /orders`
///
/// The `place_*` helpers on the orders connector fill this in; build it by
/// hand for combinations they do not cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_oid: Option<Uuid>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub product_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funds: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_after: Option<GoodTillTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_only: Option<bool>,
}

impl CreateOrder {
    fn base(order_type: OrderType, side: OrderSide, product_id: impl Into<String>) -> Self {
        Self {
            client_oid: None,
            order_type,
            side,
            product_id: product_id.into(),
            stp: None,
            stop: None,
            stop_price: None,
            price: None,
            size: None,
            funds: None,
            time_in_force: None,
            cancel_after: None,
            post_only: None,
        }
    }

    /// Market order for `amount` of base (`UseSize`) or quote (`UseFunds`) currency
    pub fn market(
        side: OrderSide,
        product_id: impl Into<String>,
        amount: Decimal,
        amount_type: AmountType,
    ) -> Self {
        let mut order = Self::base(OrderType::Market, side, product_id);
        match amount_type {
            AmountType::UseSize => order.size = Some(amount),
            AmountType::UseFunds => order.funds = Some(amount),
        }
        order
    }

    pub fn limit(
        side: OrderSide,
        product_id: impl Into<String>,
        size: Decimal,
        price: Decimal,
    ) -> Self {
        let mut order = Self::base(OrderType::Limit, side, product_id);
        order.size = Some(size);
        order.price = Some(price);
        order
    }

    /// Attach a stop trigger; the stop kind follows the order side
    pub fn with_stop(mut self, stop_price: Decimal) -> Self {
        self.stop = Some(StopType::for_side(self.side));
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    /// `GTT` with the given cancel window
    pub fn with_cancel_after(mut self, cancel_after: GoodTillTime) -> Self {
        self.time_in_force = Some(TimeInForce::GoodTillTime);
        self.cancel_after = Some(cancel_after);
        self
    }

    pub fn with_post_only(mut self, post_only: bool) -> Self {
        self.post_only = Some(post_only);
        self
    }

    pub fn with_client_oid(mut self, client_oid: Option<Uuid>) -> Self {
        self.client_oid = client_oid;
        self
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub currency: String,
    pub balance: Decimal,
    pub available: Decimal,
    pub hold: Decimal,
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Transfer,
    Match,
    Fee,
    Rebate,
    Conversion,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ActivityDetails {
    pub order_id: Option<Uuid>,
    pub trade_id: Option<String>,
    pub product_id: Option<String>,
    pub transfer_id: Option<Uuid>,
    pub transfer_type: Option<String>,
}

/// One ledger entry from `/accounts/{id}/ledger`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountActivity {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub balance: Decimal,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub details: ActivityDetails,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_deserialization() {
        let json = r#"{"time":"2018-11-26T07:23:53.243Z","trade_id":54706228,"price":"4013.64000000","size":"0.00842855","side":"sell"}"#;
        let trade: Trade = serde_json::from_str(json).unwrap();

        assert_eq!(trade.trade_id, 54_706_228);
        assert_eq!(trade.price, dec!(4013.64));
        assert_eq!(trade.size, dec!(0.00842855));
        assert_eq!(trade.side, OrderSide::Sell);
        assert_eq!(trade.time.timestamp_millis(), 1_543_217_033_243);
    }

    #[test]
    fn test_order_book_entries_by_level() {
        let level2 = r#"{"sequence":7416643032,"bids":[["3967.55","57.6603824",12]],"asks":[["3967.56","0.001",1]]}"#;
        let book: OrderBook = serde_json::from_str(level2).unwrap();
        assert_eq!(book.sequence, 7_416_643_032);
        assert_eq!(book.bids[0].price, dec!(3967.55));
        assert_eq!(book.bids[0].order_count, Some(12));
        assert_eq!(book.asks[0].order_id, None);

        let level3 = r#"{"sequence":1,"bids":[["0.00117","5.5","88588a7f-5d24-4131-b270-394dd05a1353"]],"asks":[]}"#;
        let book: OrderBook = serde_json::from_str(level3).unwrap();
        assert_eq!(book.bids[0].size, dec!(5.5));
        assert_eq!(
            book.bids[0].order_id.as_deref(),
            Some("88588a7f-5d24-4131-b270-394dd05a1353")
        );
        assert_eq!(book.bids[0].order_count, None);
    }

    #[test]
    fn test_candle_from_array() {
        let candles: Vec<Candle> =
            serde_json::from_str("[[1543217580,3820,3823.5,3821.01,3822,2.36]]").unwrap();
        assert_eq!(candles[0].time, 1_543_217_580);
        assert_eq!(candles[0].low, dec!(3820));
        assert_eq!(candles[0].volume.round_dp(2), dec!(2.36));
        assert_eq!(candles[0].start().unwrap().timestamp(), 1_543_217_580);
    }

    #[test]
    fn test_market_order_amount_type() {
        let by_size = CreateOrder::market(OrderSide::Buy, "BTC-USD", dec!(0.01), AmountType::UseSize);
        assert_eq!(by_size.size, Some(dec!(0.01)));
        assert_eq!(by_size.funds, None);

        let by_funds =
            CreateOrder::market(OrderSide::Buy, "BTC-USD", dec!(100), AmountType::UseFunds);
        assert_eq!(by_funds.funds, Some(dec!(100)));
        assert_eq!(by_funds.size, None);
    }

    #[test]
    fn test_create_order_json_omits_absent_fields() {
        let order = CreateOrder::limit(OrderSide::Sell, "BTC-USD", dec!(0.5), dec!(4000.10))
            .with_cancel_after(GoodTillTime::Hour)
            .with_post_only(true);
        let json = serde_json::to_value(&order).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "limit",
                "side": "sell",
                "product_id": "BTC-USD",
                "price": "4000.10",
                "size": "0.5",
                "time_in_force": "GTT",
                "cancel_after": "hour",
                "post_only": true
            })
        );
    }

    #[test]
    fn test_stop_kind_follows_side() {
        let buy = CreateOrder::market(OrderSide::Buy, "BTC-USD", dec!(1), AmountType::UseSize)
            .with_stop(dec!(5000));
        assert_eq!(buy.stop, Some(StopType::Entry));

        let sell = CreateOrder::limit(OrderSide::Sell, "BTC-USD", dec!(1), dec!(3900))
            .with_stop(dec!(3950));
        assert_eq!(sell.stop, Some(StopType::Loss));
        assert_eq!(sell.stop_price, Some(dec!(3950)));
    }

    #[test]
    fn test_order_with_unknown_status() {
        let json = r#"{
            "id": "d0c5340b-6d6c-49d9-b567-48c4bfca13d2",
            "price": "0.10000000",
            "size": "0.01000000",
            "product_id": "BTC-USD",
            "side": "buy",
            "stp": "dc",
            "type": "limit",
            "time_in_force": "GTC",
            "post_only": false,
            "created_at": "2016-12-08T20:02:28.53864Z",
            "fill_fees": "0.0000000000000000",
            "filled_size": "0.00000000",
            "executed_value": "0.0000000000000000",
            "status": "settling",
            "settled": false
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Unknown);
        assert_eq!(order.time_in_force, Some(TimeInForce::GoodTillCanceled));
        assert_eq!(order.price, Some(dec!(0.1)));
    }

    #[test]
    fn test_account_activity_numeric_id() {
        let json = r#"{"id":100,"created_at":"2014-11-07T08:19:27.028459Z","amount":"0.001","balance":"239.669","type":"fee","details":{"order_id":"d50ec984-77a8-460a-b958-66f114b0de9b","trade_id":"74","product_id":"BTC-USD"}}"#;
        let activity: AccountActivity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.id, "100");
        assert_eq!(activity.activity_type, ActivityType::Fee);
        assert_eq!(activity.details.trade_id.as_deref(), Some("74"));
    }
}
