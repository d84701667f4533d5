use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::signer::AuthHeaders;
use crate::exchanges::coinbase_pro::types::OrderSide;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

/// A channel entry of a subscribe frame or `subscriptions` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_ids: Vec<String>,
}

#[derive(Serialize)]
struct FeedAuth<'a> {
    key: &'a str,
    signature: &'a str,
    passphrase: &'a str,
    timestamp: &'a str,
}

impl<'a> From<&'a AuthHeaders> for FeedAuth<'a> {
    fn from(headers: &'a AuthHeaders) -> Self {
        Self {
            key: &headers.key,
            signature: &headers.signature,
            passphrase: &headers.passphrase,
            timestamp: &headers.timestamp,
        }
    }
}

#[derive(Serialize)]
struct SubscriptionFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    product_ids: Vec<String>,
    channels: Vec<Channel>,
    #[serde(flatten)]
    auth: Option<FeedAuth<'a>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscriptions {
    pub channels: Vec<Channel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedTicker {
    pub sequence: u64,
    pub product_id: String,
    pub price: Decimal,
    pub open_24h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub low_24h: Option<Decimal>,
    pub high_24h: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub side: Option<OrderSide>,
    pub time: Option<DateTime<Utc>>,
    pub trade_id: Option<u64>,
    pub last_size: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Heartbeat {
    pub sequence: u64,
    pub last_trade_id: u64,
    pub product_id: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedError {
    pub message: String,
    pub reason: Option<String>,
}

/// Decoded feed frame
///
/// Frame types without a typed variant are passed through as JSON.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    Subscriptions(Subscriptions),
    Ticker(Box<FeedTicker>),
    Heartbeat(Heartbeat),
    Error(FeedError),
    Other(Value),
}

/// Build `channel:PRODUCT` stream identifiers for every pair
pub fn stream_identifiers(channels: &[&str], product_ids: &[&str]) -> Vec<String> {
    channels
        .iter()
        .flat_map(|channel| {
            product_ids
                .iter()
                .map(move |product| format!("{}:{}", channel, product))
        })
        .collect()
}

/// Coinbase Pro feed codec
///
/// Streams are named `channel:PRODUCT` or a bare `channel`; one frame covers
/// all of them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoinbaseProCodec;

impl CoinbaseProCodec {
    pub fn new() -> Self {
        Self
    }

    /// Group streams into per-channel product lists, keeping first-seen order
    fn group_streams(
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<(Vec<String>, Vec<Channel>), ExchangeError> {
        let mut product_ids: Vec<String> = Vec::new();
        let mut channels: Vec<Channel> = Vec::new();

        for stream in streams {
            let stream = stream.as_ref();
            let (name, product) = match stream.split_once(':') {
                Some((name, product)) => (name, Some(product)),
                None => (stream, None),
            };
            if name.is_empty() || product.is_some_and(str::is_empty) {
                return Err(ExchangeError::InvalidParameters(format!(
                    "Invalid stream identifier {:?}, expected channel or channel:PRODUCT",
                    stream
                )));
            }

            let index = match channels.iter().position(|c| c.name == name) {
                Some(index) => index,
                None => {
                    channels.push(Channel {
                        name: name.to_string(),
                        product_ids: Vec::new(),
                    });
                    channels.len() - 1
                }
            };

            if let Some(product) = product {
                let channel = &mut channels[index];
                if !channel.product_ids.iter().any(|p| p == product) {
                    channel.product_ids.push(product.to_string());
                }
                if !product_ids.iter().any(|p| p == product) {
                    product_ids.push(product.to_string());
                }
            }
        }

        Ok((product_ids, channels))
    }

    fn encode_frame(
        kind: &'static str,
        streams: &[impl AsRef<str> + Send + Sync],
        auth: Option<&AuthHeaders>,
    ) -> Result<Message, ExchangeError> {
        let (product_ids, channels) = Self::group_streams(streams)?;
        let frame = SubscriptionFrame {
            kind,
            product_ids,
            channels,
            auth: auth.map(FeedAuth::from),
        };

        serde_json::to_string(&frame)
            .map(Message::Text)
            .map_err(|e| ExchangeError::SerializationError(e.to_string()))
    }

    fn decode_value(value: Value) -> Result<FeedMessage, ExchangeError> {
        fn typed<T: serde::de::DeserializeOwned>(
            kind: &str,
            value: Value,
        ) -> Result<T, ExchangeError> {
            serde_json::from_value(value).map_err(|e| {
                ExchangeError::DeserializationError(format!("Invalid {} message: {}", kind, e))
            })
        }

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(match kind.as_str() {
            "subscriptions" => FeedMessage::Subscriptions(typed(&kind, value)?),
            "ticker" => FeedMessage::Ticker(Box::new(typed(&kind, value)?)),
            "heartbeat" => FeedMessage::Heartbeat(typed(&kind, value)?),
            "error" => FeedMessage::Error(typed(&kind, value)?),
            _ => FeedMessage::Other(value),
        })
    }
}

impl WsCodec for CoinbaseProCodec {
    type Message = FeedMessage;

    fn encode_subscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
        auth: Option<&AuthHeaders>,
    ) -> Result<Message, ExchangeError> {
        Self::encode_frame("subscribe", streams, auth)
    }

    fn encode_unsubscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<Message, ExchangeError> {
        Self::encode_frame("unsubscribe", streams, None)
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let value: Value = match message {
            Message::Text(text) => serde_json::from_str(&text),
            Message::Binary(data) => serde_json::from_slice(&data),
            _ => return Ok(None),
        }
        .map_err(|e| ExchangeError::DeserializationError(format!("Failed to parse JSON: {}", e)))?;

        Self::decode_value(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame_json(message: Message) -> Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_stream_identifiers() {
        assert_eq!(
            stream_identifiers(&["ticker", "level2"], &["BTC-USD", "ETH-USD"]),
            [
                "ticker:BTC-USD",
                "ticker:ETH-USD",
                "level2:BTC-USD",
                "level2:ETH-USD"
            ]
        );
    }

    #[test]
    fn test_subscribe_frame_groups_channels() {
        let codec = CoinbaseProCodec::new();
        let message = codec
            .encode_subscription(
                &["ticker:BTC-USD", "ticker:ETH-USD", "heartbeat", "level2:BTC-USD"],
                None,
            )
            .unwrap();

        assert_eq!(
            frame_json(message),
            json!({
                "type": "subscribe",
                "product_ids": ["BTC-USD", "ETH-USD"],
                "channels": [
                    {"name": "ticker", "product_ids": ["BTC-USD", "ETH-USD"]},
                    {"name": "heartbeat"},
                    {"name": "level2", "product_ids": ["BTC-USD"]}
                ]
            })
        );
    }

    #[test]
    fn test_authenticated_subscribe_adds_signature_fields() {
        let auth = AuthHeaders {
            key: "key".to_string(),
            signature: "c2ln".to_string(),
            timestamp: "1544805953".to_string(),
            passphrase: "satoshi".to_string(),
        };
        let message = CoinbaseProCodec
            .encode_subscription(&["user:BTC-USD"], Some(&auth))
            .unwrap();
        let frame = frame_json(message);

        assert_eq!(frame["key"], "key");
        assert_eq!(frame["signature"], "c2ln");
        assert_eq!(frame["passphrase"], "satoshi");
        assert_eq!(frame["timestamp"], "1544805953");
    }

    #[test]
    fn test_unsubscribe_never_carries_auth() {
        let frame = frame_json(
            CoinbaseProCodec
                .encode_unsubscription(&["ticker:BTC-USD"])
                .unwrap(),
        );
        assert_eq!(frame["type"], "unsubscribe");
        assert!(frame.get("signature").is_none());
    }

    #[test]
    fn test_invalid_stream_identifier() {
        for stream in ["", "ticker:", ":BTC-USD"] {
            let result = CoinbaseProCodec.encode_subscription(&[stream], None);
            assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
        }
    }

    #[test]
    fn test_decode_known_and_unknown_frames() {
        let codec = CoinbaseProCodec;

        let heartbeat = r#"{"type":"heartbeat","sequence":90,"last_trade_id":20,"product_id":"BTC-USD","time":"2014-11-07T08:19:28.464459Z"}"#;
        match codec.decode_message(Message::Text(heartbeat.to_string())) {
            Ok(Some(FeedMessage::Heartbeat(hb))) => assert_eq!(hb.last_trade_id, 20),
            other => panic!("unexpected: {:?}", other),
        }

        let ticker = r#"{"type":"ticker","sequence":5928281084,"product_id":"BTC-USD","price":"4008.01","best_bid":"4008.01","best_ask":"4008.02","side":"sell","time":"2019-01-02T03:04:05.678Z","trade_id":58000000,"last_size":"0.005"}"#;
        match codec.decode_message(Message::Text(ticker.to_string())) {
            Ok(Some(FeedMessage::Ticker(t))) => {
                assert_eq!(t.product_id, "BTC-USD");
                assert_eq!(t.side, Some(OrderSide::Sell));
            }
            other => panic!("unexpected: {:?}", other),
        }

        let match_frame = r#"{"type":"match","trade_id":10,"product_id":"BTC-USD"}"#;
        assert!(matches!(
            codec.decode_message(Message::Text(match_frame.to_string())),
            Ok(Some(FeedMessage::Other(_)))
        ));

        assert!(matches!(
            codec.decode_message(Message::Text("not json".to_string())),
            Err(ExchangeError::DeserializationError(_))
        ));
    }
}
