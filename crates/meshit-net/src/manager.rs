//! Connection management: one live link per peer address.
//!
//! Each link owns a background read loop; writes are serialised through a
//! per-link mutex so frames never interleave. Connect attempts are
//! serialised globally, retry with exponential backoff, and treat an
//! existing link as success. Registering an incoming link replaces (and
//! closes) any previous link to the same address.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::io::{split, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::NetConfig;
use crate::framing;
use crate::link::Transport;
use crate::{NetError, Result};

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A link to `peer` is up (dialed or accepted).
    Connected {
        /// The peer address.
        peer: String,
    },
    /// The link to `peer` is gone.
    Disconnected {
        /// The peer address.
        peer: String,
    },
    /// One complete frame arrived from `peer`.
    Data {
        /// The peer address.
        peer: String,
        /// The frame payload (length prefix stripped).
        bytes: Vec<u8>,
    },
}

struct LinkHandle<S> {
    /// Distinguishes this link from any earlier link to the same address,
    /// so a stale read loop cannot tear down its replacement.
    id: u64,
    writer: Arc<Mutex<WriteHalf<S>>>,
    reader_task: JoinHandle<()>,
}

/// Owns every live link, keyed by peer address.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: NetConfig,
    links: Mutex<HashMap<String, LinkHandle<T::Stream>>>,
    connect_guard: Mutex<()>,
    next_link_id: AtomicU64,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a manager and the event stream it feeds.
    pub fn new(
        transport: T,
        config: NetConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            transport,
            config,
            links: Mutex::new(HashMap::new()),
            connect_guard: Mutex::new(()),
            next_link_id: AtomicU64::new(0),
            events,
        });
        (manager, events_rx)
    }

    /// Dial a peer, retrying with exponential backoff.
    ///
    /// An existing link to the address counts as success. Attempts are
    /// serialised across callers, so two tasks racing to connect to the
    /// same peer produce one link.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ConnectFailed`] once every attempt is exhausted.
    pub async fn connect(self: &Arc<Self>, address: &str) -> Result<()> {
        let _guard = self.connect_guard.lock().await;
        if self.links.lock().await.contains_key(address) {
            return Ok(());
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_retries {
            match self.transport.dial(address).await {
                Ok(stream) => {
                    self.install_link(address, stream).await;
                    info!(peer = address, attempt, "connected");
                    return Ok(());
                }
                Err(e) => {
                    debug!(peer = address, attempt, error = %e, "dial failed");
                    last_error = e.to_string();
                    if attempt < self.config.max_retries {
                        sleep(self.config.backoff_unit * 2u32.pow(attempt)).await;
                    }
                }
            }
        }
        Err(NetError::ConnectFailed {
            address: address.to_string(),
            attempts: self.config.max_retries,
            last_error,
        })
    }

    /// Adopt a link accepted by the transport's listener.
    ///
    /// Any existing link to the same address is closed first, so the newest
    /// link always wins.
    pub async fn register_incoming(self: &Arc<Self>, address: &str, stream: T::Stream) {
        let old = self.links.lock().await.remove(address);
        if let Some(old) = old {
            debug!(peer = address, "replacing existing link");
            old.reader_task.abort();
        }
        self.install_link(address, stream).await;
    }

    async fn install_link(self: &Arc<Self>, address: &str, stream: T::Stream) {
        let id = self.next_link_id.fetch_add(1, Ordering::Relaxed);
        let (read_half, write_half) = split(stream);
        let reader_task = self.spawn_read_loop(address.to_string(), read_half, id);
        let handle = LinkHandle {
            id,
            writer: Arc::new(Mutex::new(write_half)),
            reader_task,
        };
        self.links.lock().await.insert(address.to_string(), handle);
        let _ = self.events.send(LinkEvent::Connected {
            peer: address.to_string(),
        });
    }

    fn spawn_read_loop(
        self: &Arc<Self>,
        address: String,
        mut reader: ReadHalf<T::Stream>,
        link_id: u64,
    ) -> JoinHandle<()> {
        let manager: Weak<Self> = Arc::downgrade(self);
        let events = self.events.clone();
        let max_frame_bytes = self.config.max_frame_bytes;
        tokio::spawn(async move {
            loop {
                match framing::read_frame(&mut reader, max_frame_bytes).await {
                    Ok(Some(bytes)) => {
                        let _ = events.send(LinkEvent::Data {
                            peer: address.clone(),
                            bytes,
                        });
                    }
                    Ok(None) => {
                        debug!(peer = %address, "link closed by peer");
                        break;
                    }
                    Err(e) => {
                        warn!(peer = %address, error = %e, "link read failed");
                        break;
                    }
                }
            }
            if let Some(manager) = manager.upgrade() {
                manager.drop_link_if(&address, link_id).await;
            }
        })
    }

    /// Remove a link only if it is still the one the read loop belongs to.
    async fn drop_link_if(&self, address: &str, link_id: u64) {
        let removed = {
            let mut links = self.links.lock().await;
            if links.get(address).map(|h| h.id) == Some(link_id) {
                links.remove(address)
            } else {
                None
            }
        };
        if let Some(handle) = removed {
            let _ = self.events.send(LinkEvent::Disconnected {
                peer: address.to_string(),
            });
            handle.reader_task.abort();
        }
    }

    async fn drop_link(&self, address: &str) {
        let removed = self.links.lock().await.remove(address);
        if let Some(handle) = removed {
            let _ = self.events.send(LinkEvent::Disconnected {
                peer: address.to_string(),
            });
            handle.reader_task.abort();
        }
    }

    /// Send one frame to a peer. Returns `false` when no link exists or the
    /// write fails (the link is dropped in that case).
    pub async fn send(&self, address: &str, bytes: &[u8]) -> bool {
        let writer = {
            let links = self.links.lock().await;
            match links.get(address) {
                Some(handle) => handle.writer.clone(),
                None => return false,
            }
        };

        let result = {
            let mut writer = writer.lock().await;
            framing::write_frame(&mut *writer, bytes, self.config.max_frame_bytes).await
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = address, error = %e, "link write failed");
                self.drop_link(address).await;
                false
            }
        }
    }

    /// Close the link to a peer, cancelling its read loop.
    pub async fn disconnect(&self, address: &str) {
        self.drop_link(address).await;
    }

    /// Whether a live link to the address exists.
    pub async fn is_connected(&self, address: &str) -> bool {
        self.links.lock().await.contains_key(address)
    }

    /// Addresses of all live links.
    pub async fn connected_peers(&self) -> Vec<String> {
        self.links.lock().await.keys().cloned().collect()
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        // Read loops hold only weak references; stop them explicitly.
        for handle in self.links.get_mut().values() {
            handle.reader_task.abort();
        }
    }
}
