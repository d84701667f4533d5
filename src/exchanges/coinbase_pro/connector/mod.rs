use crate::core::kernel::{RestClient, WsSession};
use crate::exchanges::coinbase_pro::codec::CoinbaseProCodec;

pub mod accounts;
pub mod market_data;
pub mod orders;

pub use accounts::Accounts;
pub use market_data::MarketData;
pub use orders::Orders;

/// Coinbase Pro connector that groups the endpoint families over one transport
pub struct CoinbaseProConnector<R: RestClient, W = ()> {
    pub market: MarketData<R>,
    pub orders: Orders<R>,
    pub accounts: Accounts<R>,
    feed: Option<W>,
}

impl<R: RestClient + Clone> CoinbaseProConnector<R, ()> {
    /// Create a REST-only connector
    pub fn new_without_ws(rest: R) -> Self {
        Self {
            market: MarketData::new(&rest),
            orders: Orders::new(&rest),
            accounts: Accounts::new(&rest),
            feed: None,
        }
    }
}

impl<R: RestClient + Clone, W: WsSession<CoinbaseProCodec>> CoinbaseProConnector<R, W> {
    /// Create a connector with a feed session; the session is not opened
    pub fn new_with_ws(rest: R, ws: W) -> Self {
        Self {
            market: MarketData::new(&rest),
            orders: Orders::new(&rest),
            accounts: Accounts::new(&rest),
            feed: Some(ws),
        }
    }

    pub fn feed(&mut self) -> Option<&mut W> {
        self.feed.as_mut()
    }

    /// Move the feed session out, e.g. to drive it from its own task
    pub fn take_feed(&mut self) -> Option<W> {
        self.feed.take()
    }
}
