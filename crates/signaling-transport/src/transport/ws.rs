use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use txrtc_verto_core::Region;

use crate::config::{TlsPolicy, TransportConfig};
use crate::error::{Error, Result};
use crate::timer::Timer;
use crate::transport::{Transport, TransportEvent, TransportFactory};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// WebSocket transport for Verto signaling.
///
/// Region-pinned hosts (`us-east.rtc.telnyx.com`) get a connection timeout;
/// if it expires, or the connection fails, the transport reports a
/// disconnect asking for a reconnect against [`Region::Auto`]. Each connection
/// attempt settles exactly once: connected, failed or timed out.
#[derive(Clone)]
pub struct WebSocketTransport {
    inner: Arc<WebSocketTransportInner>,
}

struct WebSocketTransportInner {
    config: TransportConfig,
    events_tx: mpsc::Sender<TransportEvent>,
    // Bumped on every connect and disconnect
    generation: AtomicU64,
    // Highest attempt that has settled
    settled: AtomicU64,
    // Between connect() and the end of the connection
    active: AtomicBool,
    connected: AtomicBool,
    writer: AsyncMutex<Option<WsSink>>,
    connection_timeout: Timer,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Creates a transport and the channel its events arrive on
    pub fn new(config: TransportConfig) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        let transport = WebSocketTransport {
            inner: Arc::new(WebSocketTransportInner {
                config,
                events_tx,
                generation: AtomicU64::new(0),
                settled: AtomicU64::new(0),
                active: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                writer: AsyncMutex::new(None),
                connection_timeout: Timer::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        };
        (transport, events_rx)
    }

    async fn emit(&self, event: TransportEvent) {
        if let Err(e) = self.inner.events_tx.send(event).await {
            debug!("Transport event receiver dropped: {}", e);
        }
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == attempt
    }

    // Returns true for exactly one caller per attempt
    fn settle(&self, attempt: u64) -> bool {
        self.inner.settled.fetch_max(attempt, Ordering::SeqCst) < attempt
    }

    fn abort_tasks(&self) {
        for handle in self.inner.tasks.lock().drain(..) {
            handle.abort();
        }
    }

    fn loss_event(region: Region, reason: String) -> TransportEvent {
        if region.is_auto() {
            TransportEvent::Disconnected {
                reason: Some(reason),
                for_reconnect: false,
                fallback_region: None,
            }
        } else {
            TransportEvent::region_fallback(reason)
        }
    }

    // Claims the transport for a new attempt
    fn begin(&self, url: &Url) -> Result<(u64, Region)> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidUri(url.to_string()));
        }
        if self.inner.active.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyConnected);
        }
        let attempt = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let region = url.host_str().map(Region::from_host).unwrap_or_default();
        Ok((attempt, region))
    }

    fn arm_connection_timeout(&self, attempt: u64) {
        let transport = self.clone();
        let timeout = self.inner.config.connection_timeout();
        self.inner.connection_timeout.arm(timeout, async move {
            if !transport.settle(attempt) {
                return;
            }
            warn!("Signaling connection not established after {:?}, falling back to auto region", timeout);
            transport.abort_tasks();
            transport.inner.active.store(false, Ordering::SeqCst);
            transport
                .emit(TransportEvent::region_fallback(Error::ConnectionTimeout(timeout).to_string()))
                .await;
        });
    }

    fn start_attempt<F>(&self, attempt: u64, region: Region, connecting: F)
    where
        F: Future<Output = Result<WsStream>> + Send + 'static,
    {
        if !region.is_auto() {
            self.arm_connection_timeout(attempt);
        }
        let transport = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = connecting.await;
            transport.finish_attempt(attempt, region, outcome).await;
        });
        self.inner.tasks.lock().push(handle);
    }

    async fn finish_attempt(&self, attempt: u64, region: Region, outcome: Result<WsStream>) {
        if !self.settle(attempt) {
            debug!("Discarding outcome of a superseded connection attempt");
            return;
        }
        self.inner.connection_timeout.cancel();

        match outcome {
            Ok(stream) => {
                let (sink, stream) = stream.split();
                *self.inner.writer.lock().await = Some(sink);
                self.inner.connected.store(true, Ordering::SeqCst);
                info!(%region, "Signaling socket connected");
                self.emit(TransportEvent::Connected).await;
                self.spawn_reader(attempt, region, stream);
            }
            Err(e) => {
                error!(%region, "Signaling connection failed: {}", e);
                self.inner.active.store(false, Ordering::SeqCst);
                self.emit(TransportEvent::Error { error: e.to_string() }).await;
                self.emit(Self::loss_event(region, e.to_string())).await;
            }
        }
    }

    fn spawn_reader(&self, attempt: u64, region: Region, mut stream: SplitStream<WsStream>) {
        let transport = self.clone();
        let handle = tokio::spawn(async move {
            let mut reason = None;
            let mut failed = false;

            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => {
                        trace!("Received frame: {}", text.as_str());
                        transport
                            .emit(TransportEvent::TextReceived { text: text.to_string() })
                            .await;
                    }
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => transport.emit(TransportEvent::TextReceived { text }).await,
                        Err(_) => warn!("Ignoring non UTF-8 binary frame of {} bytes", data.len()),
                    },
                    Ok(WsMessage::Close(frame)) => {
                        debug!("Received close frame");
                        reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
                        break;
                    }
                    // Ping and pong are answered by tungstenite
                    Ok(_) => {}
                    Err(e) => {
                        let e = Error::from(e);
                        warn!("Signaling socket error: {}", e);
                        transport.emit(TransportEvent::Error { error: e.to_string() }).await;
                        reason = Some(e.to_string());
                        failed = true;
                        break;
                    }
                }
            }

            if !transport.is_current(attempt) {
                return;
            }
            transport.inner.connected.store(false, Ordering::SeqCst);
            transport.inner.active.store(false, Ordering::SeqCst);
            transport.inner.writer.lock().await.take();
            info!("Signaling socket closed by peer");

            let event = if failed {
                Self::loss_event(region, reason.unwrap_or_default())
            } else {
                TransportEvent::Disconnected {
                    reason,
                    for_reconnect: false,
                    fallback_region: None,
                }
            };
            transport.emit(event).await;
        });
        self.inner.tasks.lock().push(handle);
    }
}

async fn open(url: Url, policy: TlsPolicy) -> Result<WsStream> {
    let connector = match policy {
        TlsPolicy::Strict => None,
        TlsPolicy::AllowSelfSigned => {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            Some(Connector::NativeTls(tls))
        }
    };
    let (stream, response) =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector).await?;
    debug!("WebSocket handshake completed with status {}", response.status());
    Ok(stream)
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<()> {
        let (attempt, region) = self.begin(url)?;
        info!(%url, %region, "Connecting signaling socket");
        self.start_attempt(attempt, region, open(url.clone(), self.inner.config.tls_policy));
        Ok(())
    }

    async fn disconnect(&self, for_reconnect: bool) {
        if !self.inner.active.swap(false, Ordering::SeqCst) {
            debug!("Signaling socket already disconnected");
            return;
        }
        let attempt = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.settled.fetch_max(attempt, Ordering::SeqCst);
        self.inner.connection_timeout.cancel();
        self.abort_tasks();
        self.inner.connected.store(false, Ordering::SeqCst);

        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.send(WsMessage::Close(None)).await {
                debug!("Failed to send close frame: {}", e);
            }
            let _ = writer.close().await;
        }

        info!(for_reconnect, "Signaling socket disconnected");
        self.emit(TransportEvent::Disconnected {
            reason: None,
            for_reconnect,
            fallback_region: None,
        })
        .await;
    }

    async fn send(&self, text: String) -> Result<()> {
        if !self.is_connected() {
            warn!("Dropping frame, signaling socket not connected");
            return Err(Error::NotConnected);
        }
        let mut writer = self.inner.writer.lock().await;
        let Some(sink) = writer.as_mut() else {
            warn!("Dropping frame, signaling socket not connected");
            return Err(Error::NotConnected);
        };
        debug!("Sending frame: {}", text);
        sink.send(WsMessage::Text(text.into())).await.map_err(|e| {
            let e = Error::from(e);
            warn!("Failed to send frame: {}", e);
            e
        })
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WebSocketTransport(connected={})", self.is_connected())
    }
}

/// Creates [`WebSocketTransport`]s sharing one configuration
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransportFactory {
    config: TransportConfig,
}

impl WebSocketTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for WebSocketTransportFactory {
    fn create(&self) -> (Arc<dyn Transport>, mpsc::Receiver<TransportEvent>) {
        let (transport, events) = WebSocketTransport::new(self.config.clone());
        (Arc::new(transport), events)
    }
}
