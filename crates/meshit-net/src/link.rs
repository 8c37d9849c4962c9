//! The link contract radio adapters implement.

use std::future::Future;
use std::io;

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream carrying mesh frames.
///
/// Blanket-implemented for anything that reads and writes asynchronously;
/// adapters never need to name this trait in their own impls.
pub trait LinkStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> LinkStream for T {}

/// Outbound dial contract for a transport adapter.
///
/// Inbound links do not go through this trait; the adapter's accept loop
/// hands them to [`ConnectionManager::register_incoming`]
/// (see [`crate::manager`]) directly. No other assumptions are made about
/// the radio stack.
pub trait Transport: Send + Sync + 'static {
    /// The stream type this transport produces.
    type Stream: LinkStream;

    /// Open a stream to the given address.
    fn dial(&self, address: &str) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}
