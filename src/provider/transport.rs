//! The duplex WebSocket connection and its two pumps.
//!
//! ```text
//!  callers ──enqueue──► outbound queue ──► write pump ──► socket (write half)
//!                                            │ ping every keepalive_interval
//!  callers ◄──oneshot── correlation table ◄── read pump ◄── socket (read half)
//!  consumers ◄──mpsc─── subscription sinks ◄──┘
//! ```
//!
//! Only the write pump touches the write half. Everything else enqueues text
//! frames. Any read or write failure tears the connection down for good: the
//! state becomes `Dead`, the shared cancellation token fires, and the
//! correlation table is drained. There is no reconnection; a fresh provider
//! starts with fresh correlation state.

use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::WsConfig;
use crate::error::{Result, RpcError};
use crate::jsonrpc::{classify, decode_response, Incoming, SubscriptionNotification};
use crate::provider::correlation::CorrelationTable;
use crate::provider::throttle::LogThrottle;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle of one provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, `start()` not called yet (or the last attempt failed).
    Disconnected,
    /// Inside the connect loop.
    Connecting,
    /// Pumps running.
    Connected,
    /// Torn down. Terminal.
    Dead,
}

/// State shared by the facade and both pumps.
pub(crate) struct Shared {
    pub(crate) url: Url,
    pub(crate) config: WsConfig,
    pub(crate) table: CorrelationTable,
    /// Fires once, at teardown.
    pub(crate) cancel: CancellationToken,
    state: Mutex<ConnectionState>,
    outbound_tx: mpsc::Sender<String>,
    /// Handed to the write pump on the first successful start.
    outbound_rx: Mutex<Option<mpsc::Receiver<String>>>,
    /// Caps notification deliveries parked behind full subscription channels.
    deliveries: Arc<Semaphore>,
}

impl Shared {
    pub(crate) fn new(url: Url, config: WsConfig) -> Self {
        let config = config.normalized();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_capacity.max(1));
        let deliveries = Arc::new(Semaphore::new(config.max_pending_deliveries.max(1)));
        Self {
            url,
            config,
            table: CorrelationTable::new(),
            cancel: CancellationToken::new(),
            state: Mutex::new(ConnectionState::Disconnected),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            deliveries,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    /// Move from `from` to `to`. Fails if the state changed underneath.
    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut state = self.lock_state();
        if *state == from {
            *state = to;
            true
        } else {
            false
        }
    }

    /// Calls are accepted only while connected.
    pub(crate) fn ensure_open(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Dead => Err(RpcError::ConnectionClosed),
            ConnectionState::Disconnected | ConnectionState::Connecting => Err(RpcError::NotStarted),
        }
    }

    /// Hand a frame to the write pump. Waits while the queue is full.
    pub(crate) async fn enqueue(&self, frame: String) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(RpcError::ConnectionClosed),
            sent = self.outbound_tx.send(frame) => sent.map_err(|_| RpcError::ConnectionClosed),
        }
    }

    /// Kill the connection and unblock everything waiting on it.
    ///
    /// Runs once; later calls return `false` and do nothing.
    pub(crate) fn teardown(&self) -> bool {
        {
            let mut state = self.lock_state();
            if *state == ConnectionState::Dead {
                return false;
            }
            *state = ConnectionState::Dead;
        }

        // Wakes every caller blocked on a reply and both pumps.
        self.cancel.cancel();

        let drained = self.table.drain_all();
        debug!(
            "Connection to {} torn down: {} pending calls, {} subscriptions closed",
            self.url,
            drained.pending.len(),
            drained.subscriptions.len()
        );
        drop(drained);
        true
    }
}

/// Connect, then launch the read and write pumps.
pub(crate) async fn start(shared: &Arc<Shared>) -> Result<()> {
    {
        let mut state = shared.lock_state();
        match *state {
            ConnectionState::Dead => return Err(RpcError::ConnectionClosed),
            ConnectionState::Connected | ConnectionState::Connecting => return Ok(()),
            ConnectionState::Disconnected => *state = ConnectionState::Connecting,
        }
    }

    let stream = match connect(shared).await {
        Ok(stream) => stream,
        Err(e) => {
            shared.transition(ConnectionState::Connecting, ConnectionState::Disconnected);
            return Err(e);
        }
    };

    let outbound = shared
        .outbound_rx
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    let Some(outbound) = outbound else {
        return Err(RpcError::Protocol("outbound queue already taken".to_string()));
    };

    // Stopped while the connect loop was running.
    if !shared.transition(ConnectionState::Connecting, ConnectionState::Connected) {
        return Err(RpcError::ConnectionClosed);
    }

    let (sink, stream) = stream.split();
    tokio::spawn(read_pump(Arc::clone(shared), stream));
    tokio::spawn(write_pump(Arc::clone(shared), sink, outbound));

    info!("Connected to {}", shared.url);
    Ok(())
}

/// Dial the server, retrying once per `retry_interval` if configured.
async fn connect(shared: &Shared) -> Result<WsStream> {
    let mut throttle = LogThrottle::new(shared.config.connect_warn_period);
    debug!("Connecting to server on {}", shared.url);

    loop {
        let attempt = tokio::select! {
            _ = shared.cancel.cancelled() => return Err(RpcError::ConnectionClosed),
            attempt = connect_async(shared.url.as_str()) => attempt,
        };

        match attempt {
            Ok((stream, _response)) => {
                debug!("Connected to server over websocket");
                return Ok(stream);
            }
            Err(e) => {
                if throttle.allow() {
                    warn!("Error connecting to server: {}", e);
                }
                if !shared.config.retry {
                    return Err(RpcError::Connect(e.to_string()));
                }
                tokio::select! {
                    _ = shared.cancel.cancelled() => return Err(RpcError::ConnectionClosed),
                    _ = sleep(shared.config.retry_interval) => {}
                }
            }
        }
    }
}

/// Read one frame, bounded by the read deadline when enabled.
async fn next_frame(
    config: &WsConfig,
    stream: &mut SplitStream<WsStream>,
) -> Result<Option<Message>> {
    let next = match config.pong_wait {
        Some(wait) => timeout(wait, stream.next())
            .await
            .map_err(|_| RpcError::Transport(format!("no frame received within {:?}", wait)))?,
        None => stream.next().await,
    };
    next.transpose().map_err(RpcError::from)
}

async fn read_pump(shared: Arc<Shared>, mut stream: SplitStream<WsStream>) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            next = next_frame(&shared.config, &mut stream) => next,
        };

        let message = match next {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Server closed the stream");
                shared.teardown();
                break;
            }
            Err(e) => {
                debug!("Message read error: {}", e);
                shared.teardown();
                break;
            }
        };

        match message {
            Message::Text(text) => dispatch(&shared, &text).await,
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => dispatch(&shared, &text).await,
                Err(e) => warn!("Dropping non UTF-8 binary frame: {}", e),
            },
            // Any frame resets the read deadline; pongs carry nothing else.
            Message::Ping(_) | Message::Pong(_) => trace!("Keepalive frame received"),
            Message::Close(frame) => {
                debug!("Server sent close frame: {:?}", frame);
                shared.teardown();
                break;
            }
            Message::Frame(_) => {}
        }
    }
}

/// Route one decoded frame to its caller or subscription.
async fn dispatch(shared: &Arc<Shared>, text: &str) {
    let envelope = match decode_response(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Decode rpc message: {}", e);
            return;
        }
    };

    match classify(envelope) {
        Incoming::Reply { id, response } => match shared.table.resolve(&id, &response) {
            Some(reply) => {
                if reply.send(response).is_err() {
                    debug!("Caller for call {} stopped waiting", id);
                }
            }
            None => warn!("Dropping reply for unknown call id {}", id),
        },
        Incoming::Notification(notification) => deliver(shared, notification).await,
        Incoming::Unrecognized { envelope, reason } => {
            warn!("Message not handled ({}): {}", reason, envelope.raw)
        }
    }
}

/// Push a notification payload to its subscription without stalling reads.
///
/// The fast path is a non-blocking send, which keeps arrival order. A full
/// channel parks the payload in a spawned task; the number of parked tasks is
/// capped by `max_pending_deliveries`. A parked payload is dropped when its
/// subscription is removed or the connection dies. A consumer that keeps its
/// receiver but stops reading holds its permits until one of those happens.
async fn deliver(shared: &Arc<Shared>, notification: SubscriptionNotification) {
    let SubscriptionNotification {
        subscription,
        result,
    } = notification;

    let Some(route) = shared.table.lookup(&subscription) else {
        warn!("Dropping notification for unknown subscription {}", subscription);
        return;
    };

    let payload = match route.sink.try_send(result) {
        Ok(()) => return,
        Err(TrySendError::Closed(_)) => {
            debug!("Consumer of subscription {} went away", subscription);
            shared.table.unregister(&subscription);
            return;
        }
        Err(TrySendError::Full(payload)) => payload,
    };

    let permit = tokio::select! {
        biased;
        _ = shared.cancel.cancelled() => return,
        _ = route.closed.cancelled() => return,
        permit = Arc::clone(&shared.deliveries).acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return,
        },
    };

    let shared = Arc::clone(shared);
    tokio::spawn(async move {
        let _permit = permit;
        tokio::select! {
            _ = shared.cancel.cancelled() => {}
            _ = route.closed.cancelled() => {
                trace!("Dropping parked notification for closed subscription {}", subscription);
            }
            sent = route.sink.send(payload) => {
                if sent.is_err() {
                    shared.table.unregister(&subscription);
                }
            }
        }
    });
}

async fn write_frame(
    config: &WsConfig,
    sink: &mut SplitSink<WsStream, Message>,
    frame: Message,
) -> Result<()> {
    match timeout(config.write_wait, sink.send(frame)).await {
        Ok(sent) => sent.map_err(RpcError::from),
        Err(_) => Err(RpcError::Transport(format!(
            "write timed out after {:?}",
            config.write_wait
        ))),
    }
}

async fn write_pump(
    shared: Arc<Shared>,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<String>,
) {
    let period = shared.config.keepalive_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => break,
            text = outbound.recv() => match text {
                Some(text) => Message::Text(text),
                None => {
                    warn!("Outbound queue closed");
                    shared.teardown();
                    break;
                }
            },
            _ = ticker.tick() => Message::Ping(Vec::new()),
        };

        if let Err(e) = write_frame(&shared.config, &mut sink, frame).await {
            warn!("Websocket write failed: {}", e);
            shared.teardown();
            break;
        }
    }

    // Best effort: the peer may already be gone.
    let _ = timeout(shared.config.write_wait, async {
        let _ = sink.send(Message::Close(None)).await;
        let _ = sink.close().await;
    })
    .await;
    debug!("Write pump for {} exited", shared.url);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Shared {
        Shared::new(Url::parse("ws://127.0.0.1:1").unwrap(), WsConfig::default())
    }

    #[test]
    fn test_new_is_disconnected() {
        let shared = shared();
        assert_eq!(shared.state(), ConnectionState::Disconnected);
        assert!(matches!(shared.ensure_open(), Err(RpcError::NotStarted)));
    }

    #[test]
    fn test_teardown_runs_once() {
        let shared = shared();
        assert!(shared.teardown());
        assert!(!shared.teardown());
        assert_eq!(shared.state(), ConnectionState::Dead);
        assert!(shared.cancel.is_cancelled());
        assert_eq!(shared.table.pending_len(), 0);
        assert!(matches!(shared.ensure_open(), Err(RpcError::ConnectionClosed)));
    }

    #[test]
    fn test_dead_never_leaves_dead() {
        let shared = shared();
        shared.teardown();
        assert!(!shared.transition(ConnectionState::Connecting, ConnectionState::Connected));
        assert_eq!(shared.state(), ConnectionState::Dead);
    }

    #[tokio::test]
    async fn test_enqueue_after_teardown_fails_fast() {
        let shared = shared();
        shared.teardown();
        let err = shared.enqueue("{}".to_string()).await.unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[tokio::test]
    async fn test_start_after_teardown_is_refused() {
        let shared = Arc::new(shared());
        shared.teardown();
        assert!(matches!(start(&shared).await, Err(RpcError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_start_without_retry_returns_connect_error() {
        // Bind then drop a listener so the port is very likely closed.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let url = Url::parse(&format!("ws://{}", addr)).unwrap();
        let shared = Arc::new(Shared::new(url, WsConfig::default().without_retry()));

        let err = start(&shared).await.unwrap_err();
        assert!(matches!(err, RpcError::Connect(_)), "got {:?}", err);
        assert_eq!(shared.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_stop_interrupts_retry_loop() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let url = Url::parse(&format!("ws://{}", addr)).unwrap();
        let shared = Arc::new(Shared::new(url, WsConfig::default()));

        let starter = {
            let shared = Arc::clone(&shared);
            tokio::spawn(async move { start(&shared).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(shared.teardown());

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), starter)
            .await
            .expect("start should return after teardown")
            .unwrap();
        assert!(matches!(result, Err(RpcError::ConnectionClosed)));
    }
}
