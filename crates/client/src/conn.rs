//! Connection plumbing: pumps and the incoming message channel.
//!
//! Three tasks per connection: a write pump owning the sink, a read pump
//! forwarding traffic into a single ordered channel, and a ping pump for
//! keepalive. The read pump resets its pong deadline on any inbound
//! message; silence past the deadline kills the connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

use fileferry_protocol::constants::{WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use fileferry_protocol::envelope::Message;
use fileferry_protocol::wire::{self, BinaryHeader};

use crate::ClientError;

const WRITE_CHANNEL_CAPACITY: usize = 64;
const INCOMING_CHANNEL_CAPACITY: usize = 64;

/// One inbound message, already decoded.
#[derive(Debug)]
pub(crate) enum Incoming {
    Envelope(Message),
    Binary(BinaryHeader, Vec<u8>),
}

/// A live WebSocket connection with its pumps running.
pub(crate) struct Connection {
    write_tx: mpsc::Sender<tungstenite::Message>,
    incoming_rx: mpsc::Receiver<Incoming>,
    cancel: CancellationToken,
    _read_handle: tokio::task::JoinHandle<()>,
    _write_handle: tokio::task::JoinHandle<()>,
    _ping_handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub(crate) async fn connect(url: &str) -> Result<Self, ClientError> {
        let mut ws_config = tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let (ws_stream, _) =
            tokio_tungstenite::connect_async_with_config(url, Some(ws_config), false).await?;
        let (write, read) = ws_stream.split();

        let (write_tx, write_rx) = mpsc::channel(WRITE_CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let write_handle = tokio::spawn(write_pump(write, write_rx));

        let read_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(read_pump(read, incoming_tx, write_tx, cancel))
        };

        let ping_handle = {
            let write_tx = write_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(ping_pump(write_tx, cancel))
        };

        Ok(Self {
            write_tx,
            incoming_rx,
            cancel,
            _read_handle: read_handle,
            _write_handle: write_handle,
            _ping_handle: ping_handle,
        })
    }

    pub(crate) async fn send_envelope(&self, msg: &Message) -> Result<(), ClientError> {
        let json = serde_json::to_string(msg)?;
        self.write_tx
            .send(tungstenite::Message::Text(json.into()))
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Sends one binary content frame.
    pub(crate) async fn send_frame(
        &self,
        header: &BinaryHeader,
        payload: &[u8],
    ) -> Result<(), ClientError> {
        let frame = wire::encode_frame(header, payload)?;
        self.write_tx
            .send(tungstenite::Message::Binary(frame.into()))
            .await
            .map_err(|_| ClientError::Closed)
    }

    /// Receives the next inbound message, bounded by `timeout`.
    pub(crate) async fn recv(&mut self, timeout: Duration) -> Result<Incoming, ClientError> {
        match tokio::time::timeout(timeout, self.incoming_rx.recv()).await {
            Ok(Some(incoming)) => Ok(incoming),
            Ok(None) => Err(ClientError::Closed),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Gracefully closes the connection.
    pub(crate) async fn close(&self) {
        let _ = self
            .write_tx
            .send(tungstenite::Message::Close(None))
            .await;
        self.cancel.cancel();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
        self._read_handle.abort();
        self._write_handle.abort();
        self._ping_handle.abort();
    }
}

/// Forwards outbound messages to the sink until all senders drop.
async fn write_pump<S>(mut sink: S, mut rx: mpsc::Receiver<tungstenite::Message>)
where
    S: SinkExt<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(msg) = rx.recv().await {
        if let Err(e) = sink.send(msg).await {
            tracing::debug!("write pump stopping: {e}");
            return;
        }
    }
    let _ = sink.close().await;
}

/// Reads the WebSocket and forwards decoded messages in arrival order.
async fn read_pump<S>(
    mut read: S,
    incoming_tx: mpsc::Sender<Incoming>,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    // Any incoming message resets the deadline, not just pongs.
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                tracing::warn!("pong timeout, closing connection");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline
                            .as_mut()
                            .reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                match serde_json::from_str::<Message>(text.as_str()) {
                                    Ok(envelope) => {
                                        if incoming_tx.send(Incoming::Envelope(envelope)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => tracing::warn!("unparseable envelope: {e}"),
                                }
                            }
                            tungstenite::Message::Binary(data) => {
                                match wire::parse_frame(&data) {
                                    Ok((header, payload)) => {
                                        if incoming_tx.send(Incoming::Binary(header, payload)).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => tracing::warn!("bad binary frame: {e}"),
                                }
                            }
                            tungstenite::Message::Ping(data) => {
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {}
                            tungstenite::Message::Close(_) => {
                                tracing::debug!("received close frame");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        tracing::debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }
    // Dropping incoming_tx surfaces Closed to the operation in flight.
}

/// Sends periodic pings to keep the connection alive.
async fn ping_pump(write_tx: mpsc::Sender<tungstenite::Message>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(WS_PING_PERIOD);
    interval.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                let ping = tungstenite::Message::Ping(vec![].into());
                if write_tx.send(ping).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use fileferry_protocol::constants::MessageType;

    #[tokio::test]
    async fn ping_pump_stops_on_cancel() {
        let (tx, _rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let c = cancel.clone();
        let handle = tokio::spawn(async move {
            ping_pump(tx, c).await;
        });

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("should stop")
            .expect("no panic");
    }

    #[tokio::test]
    async fn read_pump_forwards_in_arrival_order() {
        let envelope = Message::new::<()>("m-1", MessageType::StreamEnd, None).unwrap();
        let envelope_json = serde_json::to_string(&envelope).unwrap();
        let frame = wire::encode_frame(
            &BinaryHeader {
                id: "m-1".into(),
                offset: 0,
            },
            b"shard",
        )
        .unwrap();

        let items: Vec<Result<tungstenite::Message, tungstenite::Error>> = vec![
            Ok(tungstenite::Message::Binary(frame.into())),
            Ok(tungstenite::Message::Text(envelope_json.into())),
        ];
        let (incoming_tx, mut incoming_rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::channel(16);

        read_pump(
            stream::iter(items),
            incoming_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await;

        match incoming_rx.recv().await.unwrap() {
            Incoming::Binary(header, payload) => {
                assert_eq!(header.id, "m-1");
                assert_eq!(payload, b"shard");
            }
            other => panic!("expected binary first, got {other:?}"),
        }
        match incoming_rx.recv().await.unwrap() {
            Incoming::Envelope(msg) => assert_eq!(msg.msg_type, MessageType::StreamEnd),
            other => panic!("expected envelope, got {other:?}"),
        }
        assert!(incoming_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn read_pump_replies_pong_to_ping() {
        let items: Vec<Result<tungstenite::Message, tungstenite::Error>> =
            vec![Ok(tungstenite::Message::Ping(b"ka".to_vec().into()))];
        let (incoming_tx, _incoming_rx) = mpsc::channel(16);
        let (write_tx, mut write_rx) = mpsc::channel(16);

        read_pump(
            stream::iter(items),
            incoming_tx,
            write_tx,
            CancellationToken::new(),
        )
        .await;

        match write_rx.recv().await.unwrap() {
            tungstenite::Message::Pong(data) => assert_eq!(data.as_ref(), b"ka"),
            other => panic!("expected pong, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn read_pump_times_out_on_silence() {
        tokio::time::pause();

        let (incoming_tx, mut incoming_rx) = mpsc::channel(16);
        let (write_tx, _write_rx) = mpsc::channel(16);
        let silent = stream::pending::<Result<tungstenite::Message, tungstenite::Error>>();

        let handle = tokio::spawn(read_pump(
            silent,
            incoming_tx,
            write_tx,
            CancellationToken::new(),
        ));

        tokio::time::advance(WS_PONG_WAIT + Duration::from_secs(1)).await;
        handle.await.unwrap();
        assert!(incoming_rx.recv().await.is_none());
    }
}
