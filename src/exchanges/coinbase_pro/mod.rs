pub mod codec;
pub mod types;

pub mod builder;
pub mod connector;
pub mod rest;

pub use builder::{
    build_connector, build_connector_with_websocket, CoinbaseProBuilder, EXCHANGE_NAME,
};
pub use codec::{stream_identifiers, CoinbaseProCodec, FeedMessage};
pub use connector::{Accounts, CoinbaseProConnector, MarketData, Orders};
pub use rest::CoinbaseProRest;
pub use types::{
    Account, AccountActivity, AmountType, Candle, CreateOrder, Currency, GoodTillTime, Order,
    OrderBook, OrderSide, OrderType, Product, Stats, StopType, Ticker, TimeInForce, Trade,
};
