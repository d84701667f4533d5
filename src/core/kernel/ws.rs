use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::signer::{AuthHeaders, RequestSigner};
use crate::core::kernel::time::{SystemClock, TimeSource};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument, warn};

/// Request path signed to authenticate a feed subscription
pub const VERIFY_PATH: &str = "/users/self/verify";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
        }
    }
}

/// WebSocket session trait - pure transport layer
#[async_trait]
pub trait WsSession<C: WsCodec>: Send + Sync {
    /// Open the socket. Only the first call on an instance may succeed.
    async fn connect(&mut self) -> Result<(), ExchangeError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next data frame
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;

    /// Subscribe to streams using the codec
    async fn subscribe(
        &mut self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<(), ExchangeError>;

    /// Unsubscribe from streams using the codec
    async fn unsubscribe(
        &mut self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<(), ExchangeError>;

    /// Get the next decoded message
    async fn next_message(&mut self) -> Option<Result<C::Message, ExchangeError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// `connect` has not been called
    Fresh,
    Open,
    /// Connect failed or the socket closed; the instance cannot be reused
    Spent,
}

/// Tungstenite-based feed session
///
/// Single-shot: a second `connect` on the same instance returns
/// `AlreadyConnected`, whether the first attempt succeeded, failed or the
/// socket has since closed. Create a new instance to reconnect.
pub struct TungsteniteWs<C: WsCodec> {
    url: String,
    write: Option<SplitSink<WsStream, Message>>,
    read: Option<SplitStream<WsStream>>,
    state: SessionState,
    exchange_name: String,
    codec: C,
    config: WsConfig,
    signer: Option<Arc<RequestSigner>>,
    clock: Arc<dyn TimeSource>,
}

impl<C: WsCodec> TungsteniteWs<C> {
    /// Create a new WebSocket session with the specified codec
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `exchange_name` - Name of the exchange for logging/tracing
    /// * `codec` - The codec to handle message encoding/decoding
    pub fn new(url: String, exchange_name: String, codec: C) -> Self {
        Self {
            url,
            write: None,
            read: None,
            state: SessionState::Fresh,
            exchange_name,
            codec,
            config: WsConfig::default(),
            signer: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    /// Authenticate subscriptions with this signer
    pub fn with_signer(mut self, signer: Arc<RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_time_source(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn subscription_auth(&self) -> Result<Option<AuthHeaders>, ExchangeError> {
        match &self.signer {
            Some(signer) => {
                let timestamp = self.clock.now().await?;
                signer.sign(timestamp, "GET", VERIFY_PATH, b"").map(Some)
            }
            None => Ok(None),
        }
    }

    fn ensure_open(&self) -> Result<(), ExchangeError> {
        if self.state == SessionState::Open {
            Ok(())
        } else {
            Err(ExchangeError::NotConnected)
        }
    }

    fn mark_spent(&mut self) {
        self.state = SessionState::Spent;
        self.write = None;
        self.read = None;
    }
}

#[async_trait]
impl<C: WsCodec> WsSession<C> for TungsteniteWs<C> {
    #[instrument(skip(self), fields(exchange = %self.exchange_name, url = %self.url))]
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        if self.state != SessionState::Fresh {
            return Err(ExchangeError::AlreadyConnected);
        }
        self.state = SessionState::Spent;

        let connect_timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let (ws_stream, _) = tokio::time::timeout(connect_timeout, connect_async(&self.url))
            .await
            .map_err(|_| ExchangeError::network("WebSocket connection timeout"))?
            .map_err(|e| ExchangeError::network(format!("WebSocket connection failed: {}", e)))?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.state = SessionState::Open;
        debug!("feed connected");

        Ok(())
    }

    #[instrument(skip(self, msg), fields(exchange = %self.exchange_name))]
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        self.ensure_open()?;

        let write = self.write.as_mut().ok_or(ExchangeError::NotConnected)?;
        if let Err(e) = write.send(msg).await {
            self.mark_spent();
            return Err(ExchangeError::network(format!(
                "Failed to send WebSocket message: {}",
                e
            )));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        if let Err(e) = self.ensure_open() {
            return Some(Err(e));
        }

        loop {
            let next = self.read.as_mut()?.next().await;
            match next {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.send_raw(Message::Pong(data)).await {
                        warn!("Failed to send pong response: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "feed closed by server");
                    self.mark_spent();
                    return None;
                }
                Some(Ok(message)) => return Some(Ok(message)),
                Some(Err(e)) => {
                    self.mark_spent();
                    return Some(Err(ExchangeError::network(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                None => {
                    self.mark_spent();
                    return None;
                }
            }
        }
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        if self.state == SessionState::Open {
            self.mark_spent();
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state == SessionState::Open
    }

    #[instrument(skip(self, streams), fields(exchange = %self.exchange_name, stream_count = streams.len()))]
    async fn subscribe(
        &mut self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        if streams.is_empty() {
            return Ok(());
        }

        let auth = self.subscription_auth().await?;
        let message = self.codec.encode_subscription(streams, auth.as_ref())?;
        self.send_raw(message).await
    }

    #[instrument(skip(self, streams), fields(exchange = %self.exchange_name, stream_count = streams.len()))]
    async fn unsubscribe(
        &mut self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        if streams.is_empty() {
            return Ok(());
        }

        let message = self.codec.encode_unsubscription(streams)?;
        self.send_raw(message).await
    }

    #[instrument(skip(self), fields(exchange = %self.exchange_name))]
    async fn next_message(&mut self) -> Option<Result<C::Message, ExchangeError>> {
        loop {
            match self.next_raw().await? {
                Ok(raw_msg) => match self.codec.decode_message(raw_msg) {
                    Ok(Some(decoded)) => return Some(Ok(decoded)),
                    Ok(None) => {}
                    Err(e) => return Some(Err(e)),
                },
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
