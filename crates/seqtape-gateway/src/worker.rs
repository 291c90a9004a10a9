//! Generic reconnecting WebSocket worker.
//!
//! The worker owns the connection lifecycle
//! (`Disconnected -> Connecting -> Subscribed -> Reading`) and the write
//! half of the socket: handlers queue frames into an [`Outbox`] and the
//! worker task writes them, so there is exactly one writer per connection.
//! Any read error, timeout or close frame tears the connection down and the
//! loop reconnects under the exponential backoff schedule. A shared watch
//! signal cancels both the read and ping arms cooperatively.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::backoff::backoff_delay;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Venue-specific behavior plugged into the worker.
///
/// Handlers are synchronous: they parse payloads and queue outbound frames;
/// all awaiting happens in the worker.
pub trait Gateway: Send + 'static {
    /// Short identifier for logs ("UPBIT", "BITGET_SPOT", ...).
    fn id(&self) -> &str;

    /// WebSocket endpoint to dial.
    fn endpoint(&self) -> String;

    /// Queue subscription frames after the socket opens.
    fn on_connect(&mut self, out: &mut Outbox);

    /// Handle one inbound text/binary payload.
    fn on_message(&mut self, payload: &[u8]);

    /// Queue keep-alive frames on the ping interval.
    fn on_ping(&mut self, out: &mut Outbox);
}

/// Frames queued by a handler for the worker to write.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<Message>,
}

impl Outbox {
    pub fn text(&mut self, payload: impl Into<String>) {
        self.frames.push(Message::Text(payload.into()));
    }

    pub fn binary(&mut self, payload: Vec<u8>) {
        self.frames.push(Message::Binary(payload));
    }

    pub fn ping(&mut self) {
        self.frames.push(Message::Ping(Vec::new()));
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn drain(&mut self) -> std::vec::Drain<'_, Message> {
        self.frames.drain(..)
    }
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub read_timeout: Duration,
    pub ping_interval: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(30),
        }
    }
}

/// A spawned gateway connection task.
pub struct WsWorker {
    handle: JoinHandle<()>,
}

impl WsWorker {
    /// Spawn the connection loop. The worker stops when `cancel` flips to
    /// `true` (or its sender is dropped).
    pub fn spawn<G: Gateway>(gateway: G, config: WsConfig, cancel: watch::Receiver<bool>) -> Self {
        let handle = tokio::spawn(run_loop(gateway, config, cancel));
        Self { handle }
    }

    /// Wait for the connection and ping arms to finish. Call after the
    /// shared cancel signal has fired.
    pub async fn stop(self) {
        let _ = self.handle.await;
    }
}

enum SessionEnd {
    Cancelled,
    Disconnected,
}

async fn run_loop<G: Gateway>(mut gateway: G, config: WsConfig, mut cancel: watch::Receiver<bool>) {
    let mut retry: i32 = 0;
    loop {
        if *cancel.borrow() {
            break;
        }

        let endpoint = gateway.endpoint();
        debug!(id = gateway.id(), endpoint = %endpoint, "connecting");

        let connected = tokio::select! {
            _ = cancel.changed() => break,
            res = connect_async(&endpoint) => res,
        };

        match connected {
            Ok((stream, _)) => {
                info!(id = gateway.id(), endpoint = %endpoint, "connected");
                retry = 0;
                match session(&mut gateway, stream, &config, &mut cancel).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Disconnected => {}
                }
            }
            Err(e) => {
                warn!(id = gateway.id(), error = %e, retry, "connect failed");
            }
        }

        if *cancel.borrow() {
            break;
        }
        let delay = backoff_delay(retry);
        retry = retry.saturating_add(1);
        debug!(id = gateway.id(), delay_ms = delay.as_millis() as u64, "reconnect backoff");
        tokio::select! {
            _ = cancel.changed() => break,
            _ = sleep(delay) => {}
        }
    }
    info!(id = gateway.id(), "gateway stopped");
}

async fn session<G: Gateway>(
    gateway: &mut G,
    stream: WsStream,
    config: &WsConfig,
    cancel: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    let mut outbox = Outbox::default();
    gateway.on_connect(&mut outbox);
    if let Err(e) = flush(&mut write, &mut outbox).await {
        warn!(id = gateway.id(), error = %e, "subscribe failed");
        return SessionEnd::Disconnected;
    }
    debug!(id = gateway.id(), "subscribed");

    let mut ping = interval_at(Instant::now() + config.ping_interval, config.ping_interval);

    loop {
        tokio::select! {
            _ = cancel.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return SessionEnd::Cancelled;
            }

            _ = ping.tick() => {
                gateway.on_ping(&mut outbox);
                if let Err(e) = flush(&mut write, &mut outbox).await {
                    warn!(id = gateway.id(), error = %e, "ping failed");
                    return SessionEnd::Disconnected;
                }
            }

            next = timeout(config.read_timeout, read.next()) => {
                match next {
                    Err(_) => {
                        warn!(id = gateway.id(), timeout_secs = config.read_timeout.as_secs(), "read timeout");
                        return SessionEnd::Disconnected;
                    }
                    Ok(None) => {
                        warn!(id = gateway.id(), "stream ended");
                        return SessionEnd::Disconnected;
                    }
                    Ok(Some(Err(e))) => {
                        warn!(id = gateway.id(), error = %e, "read error");
                        return SessionEnd::Disconnected;
                    }
                    Ok(Some(Ok(msg))) => {
                        if handle_message(gateway, &mut write, msg).await.is_err() {
                            return SessionEnd::Disconnected;
                        }
                    }
                }
            }
        }
    }
}

/// `Err(())` when the message (or the reply it forced) ends the session.
async fn handle_message<G: Gateway>(
    gateway: &mut G,
    write: &mut WsSink,
    msg: Message,
) -> Result<(), ()> {
    match msg {
        Message::Text(txt) => gateway.on_message(txt.as_bytes()),
        Message::Binary(payload) => gateway.on_message(&payload),
        Message::Ping(data) => {
            if write.send(Message::Pong(data)).await.is_err() {
                return Err(());
            }
        }
        Message::Pong(_) => {}
        Message::Close(frame) => {
            warn!(id = gateway.id(), ?frame, "close frame received");
            return Err(());
        }
        _ => {}
    }
    Ok(())
}

async fn flush(
    write: &mut WsSink,
    outbox: &mut Outbox,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    for frame in outbox.drain() {
        write.send(frame).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_queues_in_order() {
        let mut out = Outbox::default();
        out.text("subscribe");
        out.ping();
        out.binary(vec![1, 2, 3]);
        let frames: Vec<Message> = out.drain().collect();
        assert_eq!(frames.len(), 3);
        assert!(matches!(&frames[0], Message::Text(t) if t == "subscribe"));
        assert!(matches!(frames[1], Message::Ping(_)));
        assert!(matches!(&frames[2], Message::Binary(b) if b == &[1, 2, 3]));
        assert!(out.is_empty());
    }
}
