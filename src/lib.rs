pub mod core;
pub mod exchanges;

pub use core::{
    config::ExchangeConfig,
    errors::{ExchangeError, TransportError},
    kernel::{Cursor, Page, PageRequest},
};
pub use exchanges::coinbase_pro::{CoinbaseProBuilder, CoinbaseProConnector};
