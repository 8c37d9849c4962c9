//! TCP reference transport.
//!
//! Radios are the production links; TCP exists so the daemon and the test
//! suite can run the full stack on loopback with the identical framing and
//! connection lifecycle.

use std::io;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::link::Transport;
use crate::manager::ConnectionManager;

/// Dials peers over TCP; addresses are `host:port` strings.
#[derive(Debug, Default, Clone)]
pub struct TcpTransport;

impl TcpTransport {
    /// Create the transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    async fn dial(&self, address: &str) -> io::Result<Self::Stream> {
        TcpStream::connect(address).await
    }
}

/// Accept incoming TCP links and hand them to the manager.
///
/// Runs until the listener errors or the manager is dropped. The remote
/// socket address becomes the link's peer address.
pub fn spawn_acceptor(
    listener: TcpListener,
    manager: Arc<ConnectionManager<TcpTransport>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, remote)) => {
                    debug!(peer = %remote, "accepted incoming link");
                    manager.register_incoming(&remote.to_string(), stream).await;
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetConfig;
    use crate::manager::LinkEvent;

    #[tokio::test]
    async fn test_dial_accept_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = listener.local_addr().unwrap().to_string();

        let (server, mut server_events) =
            ConnectionManager::new(TcpTransport::new(), NetConfig::default());
        let _acceptor = spawn_acceptor(listener, server.clone());

        let (client, mut client_events) =
            ConnectionManager::new(TcpTransport::new(), NetConfig::default());
        client.connect(&server_addr).await.unwrap();

        let LinkEvent::Connected { .. } = client_events.recv().await.unwrap() else {
            panic!("expected client Connected");
        };
        let LinkEvent::Connected { peer } = server_events.recv().await.unwrap() else {
            panic!("expected server Connected");
        };

        assert!(client.send(&server_addr, b"over tcp").await);
        let LinkEvent::Data { bytes, .. } = server_events.recv().await.unwrap() else {
            panic!("expected Data");
        };
        assert_eq!(bytes, b"over tcp");

        // And back the other way on the accepted link.
        assert!(server.send(&peer, b"reply").await);
        let LinkEvent::Data { bytes, .. } = client_events.recv().await.unwrap() else {
            panic!("expected Data");
        };
        assert_eq!(bytes, b"reply");
    }

    #[tokio::test]
    async fn test_dial_refused_address_fails() {
        // Bind and immediately drop to get a (very likely) dead port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let config = NetConfig::default()
            .with_backoff_unit(std::time::Duration::from_millis(1));
        let (client, _events) = ConnectionManager::new(TcpTransport::new(), config);
        assert!(client.connect(&dead_addr).await.is_err());
    }
}
