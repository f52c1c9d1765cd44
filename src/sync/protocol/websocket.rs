//! WebSocket Connection Transport.
//!
//! This module implements `GalleryTransport` on top of a `tungstenite` client
//! socket owned by a background thread. It acts as a **Facade**, bridging the
//! single-threaded `SyncOrchestrator` (Driver) with blocking network I/O.
//!
//! # Architecture
//! * **Shared State**: `Arc<Mutex<SharedState>>` holds the inbound and outbound
//!   frame queues plus the listener flag.
//! * **Outbound Queue**: `send_frame` only enqueues. The background thread
//!   drains the queue between reads.
//! * **Socket Loop**: reads use a short timeout so the thread can interleave
//!   writes and notice shutdown without a second socket handle.
//!
//! Reconnection and backoff are not handled here; once the socket closes the
//! transport reports `is_closed()` and refuses further sends.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect as websocket_connect, Message as WsMessage, WebSocket};

use super::api::{GalleryTransport, TransportError};

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

// =====================================================================
// Shared State
// =====================================================================

/// State shared between the driver thread and the socket thread.
#[derive(Debug, Default)]
struct SharedState {
    // --- Output (Network -> Driver) ---
    inbound: VecDeque<String>,

    // --- Input (Driver -> Network) ---
    outbound: VecDeque<String>,

    // --- Lifecycle ---
    subscribed: bool,
    connected: bool,
    closed: bool,
    stop: bool,
    connect_error: Option<String>,

    /// Frames received while no listener was attached.
    dropped: u64,
}

struct Shared {
    state: Mutex<SharedState>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =====================================================================
// Public Transport (blocking facade)
// =====================================================================

pub struct WebSocketTransport {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    /// Connects to `url` (`ws://` or `wss://`).
    ///
    /// Blocks until the handshake has completed or failed. `read_poll` bounds
    /// how long the socket thread waits on a read before servicing the
    /// outbound queue.
    pub fn connect(url: &str, read_poll: Duration) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(SharedState::default()),
            ready: Condvar::new(),
        });

        let bg = Arc::clone(&shared);
        let target = url.to_string();

        let worker = std::thread::Builder::new()
            .name("gallery-ws".to_string())
            .spawn(move || match open_socket(&target, read_poll) {
                Ok(ws) => {
                    {
                        let mut s = bg.lock();
                        s.connected = true;
                    }
                    bg.ready.notify_all();
                    log::info!("[WS] connected to {}", target);
                    run_socket_loop(ws, &bg);
                }
                Err(e) => {
                    {
                        let mut s = bg.lock();
                        s.connect_error = Some(format!("{:#}", e));
                        s.closed = true;
                    }
                    bg.ready.notify_all();
                }
            })
            .context("failed to spawn websocket thread")?;

        // Block until the background thread reports the handshake outcome.
        let failure = {
            let mut guard = shared.lock();
            while !guard.connected && guard.connect_error.is_none() {
                guard = shared
                    .ready
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            guard.connect_error.clone()
        };

        if let Some(err) = failure {
            let _ = worker.join();
            return Err(anyhow!("could not connect to {}: {}", url, err));
        }

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Number of frames discarded because no listener was attached.
    pub fn dropped_frames(&self) -> u64 {
        self.shared.lock().dropped
    }
}

impl GalleryTransport for WebSocketTransport {
    fn subscribe(&mut self) -> Result<(), TransportError> {
        let mut s = self.shared.lock();
        if s.subscribed {
            return Err(TransportError::AlreadySubscribed);
        }
        s.subscribed = true;
        log::debug!("[WS] listener attached");
        Ok(())
    }

    fn unsubscribe(&mut self) {
        let mut s = self.shared.lock();
        s.subscribed = false;
        s.inbound.clear();
        log::debug!("[WS] listener detached");
    }

    fn is_subscribed(&self) -> bool {
        self.shared.lock().subscribed
    }

    fn poll_frame(&mut self) -> Option<String> {
        let mut s = self.shared.lock();
        if !s.subscribed {
            return None;
        }
        s.inbound.pop_front()
    }

    fn send_frame(&mut self, frame: String) -> Result<(), TransportError> {
        let mut s = self.shared.lock();
        if s.closed {
            return Err(TransportError::Closed);
        }
        s.outbound.push_back(frame);
        log::trace!("[WS] queued frame (queue len={})", s.outbound.len());
        Ok(())
    }

    fn is_closed(&self) -> bool {
        let s = self.shared.lock();
        s.closed && s.inbound.is_empty()
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.shared.lock().stop = true;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// =====================================================================
// Socket thread
// =====================================================================

fn open_socket(url: &str, read_poll: Duration) -> Result<Socket> {
    let (mut ws, _) = websocket_connect(url).context("websocket handshake failed")?;
    set_socket_read_timeout(&mut ws, Some(read_poll));
    Ok(ws)
}

fn set_socket_read_timeout(ws: &mut Socket, timeout: Option<Duration>) {
    match ws.get_mut() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(timeout);
        }
        MaybeTlsStream::Rustls(stream) => {
            let _ = stream.get_mut().set_read_timeout(timeout);
        }
        _ => {}
    }
}

fn run_socket_loop(mut ws: Socket, shared: &Shared) {
    loop {
        let (frames, stop) = {
            let mut s = shared.lock();
            (s.outbound.drain(..).collect::<Vec<_>>(), s.stop)
        };

        if stop {
            log::info!("[WS] closing socket");
            let _ = ws.close(None);
            let _ = ws.flush();
            break;
        }

        for frame in frames {
            log::trace!("[WS] >>> {}", frame);
            if let Err(e) = ws.send(WsMessage::Text(frame.into())) {
                log::warn!("[WS] send failed: {}", e);
                if is_transport_error(&e) {
                    mark_closed(shared);
                    return;
                }
            }
        }

        let raw = match ws.read() {
            Ok(WsMessage::Text(text)) => text.to_string(),
            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    log::warn!("[WS] dropping non UTF-8 binary frame");
                    continue;
                }
            },
            Ok(WsMessage::Close(_)) => {
                log::info!("[WS] server closed the connection");
                break;
            }
            Ok(_) => continue,
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(e) => {
                if is_transport_error(&e) {
                    log::info!("[WS] connection lost: {}", e);
                } else {
                    log::error!("[WS] read failed: {}", e);
                }
                break;
            }
        };

        log::trace!("[WS] <<< {}", raw.trim());

        let mut s = shared.lock();
        if s.subscribed {
            s.inbound.push_back(raw);
        } else {
            s.dropped += 1;
        }
    }

    mark_closed(shared);
}

fn mark_closed(shared: &Shared) {
    let mut s = shared.lock();
    s.closed = true;
    s.outbound.clear();
}

fn is_transport_error(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => true,
        tungstenite::Error::Io(io_err) => matches!(
            io_err.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
                | ErrorKind::NotConnected
        ),
        tungstenite::Error::Tls(_) => true,
        _ => false,
    }
}
