// ABOUTME: WebSocket transport for console clients.
// ABOUTME: Maps tungstenite messages to the frame streams the client adapters expect.

use bytes::Bytes;
use futures::future;
use futures::{Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use super::adapter::{ClientReader, ClientWriter};

/// Inbound payloads of a message stream, ending at the first close frame.
///
/// Text and binary payloads pass through unchanged; ping, pong and raw frames carry no input.
pub fn incoming_frames<S>(messages: S) -> impl Stream<Item = Result<Bytes, WsError>> + Unpin
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    messages
        .try_take_while(|message| future::ready(Ok(!message.is_close())))
        .try_filter_map(|message| future::ready(Ok(frame_payload(message))))
}

/// Outbound sink taking one remote-output chunk per frame.
pub fn outgoing_frames<K>(messages: K) -> impl Sink<Bytes, Error = WsError> + Unpin
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    messages.with(|chunk: Bytes| future::ready(Ok::<_, WsError>(chunk_message(chunk))))
}

/// Split an upgraded connection into the client halves of a bridge.
pub fn client_endpoint<T>(
    ws: WebSocketStream<T>,
) -> (
    ClientReader<impl Stream<Item = Result<Bytes, WsError>> + Unpin + Send>,
    ClientWriter<impl Sink<Bytes, Error = WsError> + Unpin + Send>,
)
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (sink, stream) = ws.split();
    (
        ClientReader::new(incoming_frames(stream)),
        ClientWriter::new(outgoing_frames(sink)),
    )
}

/// Report a failure to the browser and close the connection.
pub async fn send_error<K>(messages: &mut K, message: &str) -> Result<(), WsError>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    messages
        .send(Message::Text(format!("error: {message}")))
        .await?;
    messages.close().await
}

fn frame_payload(message: Message) -> Option<Bytes> {
    match message {
        Message::Text(text) => Some(Bytes::from(text)),
        Message::Binary(data) => Some(Bytes::from(data)),
        _ => None,
    }
}

fn chunk_message(chunk: Bytes) -> Message {
    match String::from_utf8(chunk.to_vec()) {
        Ok(text) => Message::Text(text),
        Err(e) => Message::Binary(e.into_bytes()),
    }
}
