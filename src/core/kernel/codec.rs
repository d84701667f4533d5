use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::AuthHeaders;
use tokio_tungstenite::tungstenite::Message;

/// Exchange-specific framing for the WebSocket feed
///
/// Control frames are handled by the session; codecs only see data frames.
pub trait WsCodec: Send + Sync + 'static {
    /// The type representing parsed messages from this exchange
    type Message: Send + Sync;

    /// Encode a subscription request into a WebSocket message
    ///
    /// # Arguments
    /// * `streams` - The stream identifiers to subscribe to
    /// * `auth` - Signature fields to embed when the subscription is authenticated
    fn encode_subscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
        auth: Option<&AuthHeaders>,
    ) -> Result<Message, ExchangeError>;

    /// Encode an unsubscription request into a WebSocket message
    fn encode_unsubscription(
        &self,
        streams: &[impl AsRef<str> + Send + Sync],
    ) -> Result<Message, ExchangeError>;

    /// Decode a raw data frame
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully decoded message
    /// - `Ok(None)` - Message was ignored/filtered by codec
    /// - `Err(error)` - Failed to decode message
    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError>;
}
