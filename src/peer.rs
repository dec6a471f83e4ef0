//! Fetching one statistics table from each configured peer.
//!
//! A fetch connects, writes the `show stat` command, and accumulates the
//! response until the peer closes its side of the connection; only then is
//! the buffer handed to the wire codec. [`collect`] drives every fetch
//! concurrently and acts as the join barrier before the merge: no table is
//! merged until all peers have closed.

use std::io;

use futures::future::try_join_all;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{TcpStream, UnixStream},
};
use tracing::debug;

use crate::{
    endpoint::Endpoint,
    wire::{Table, WireError, STAT_COMMAND},
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to peer {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: io::Error,
    },
    #[error("i/o error while talking to peer {endpoint}: {source}")]
    Io {
        endpoint: Endpoint,
        source: io::Error,
    },
    #[error("peer {endpoint} returned a malformed table: {source}")]
    Malformed {
        endpoint: Endpoint,
        source: WireError,
    },
}

/// Retrieves and parses one peer's statistics table.
///
/// Connection failures are terminal for the whole startup; no retry
/// happens here.
pub async fn fetch(endpoint: &Endpoint) -> Result<Table, FetchError> {
    let table = match endpoint {
        Endpoint::Tcp(addr) => {
            let stream = TcpStream::connect(addr).await.map_err(|source| {
                FetchError::Connect {
                    endpoint: endpoint.clone(),
                    source,
                }
            })?;
            exchange(stream, endpoint).await?
        }
        Endpoint::Unix(path) => {
            let stream = UnixStream::connect(path).await.map_err(|source| {
                FetchError::Connect {
                    endpoint: endpoint.clone(),
                    source,
                }
            })?;
            exchange(stream, endpoint).await?
        }
    };

    debug!(peer = %endpoint, rows = table.rows.len(), "fetched peer snapshot");
    Ok(table)
}

async fn exchange<S>(mut stream: S, endpoint: &Endpoint) -> Result<Table, FetchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(format!("{STAT_COMMAND}\n").as_bytes())
        .await
        .map_err(|source| io_error(endpoint, source))?;
    stream
        .flush()
        .await
        .map_err(|source| io_error(endpoint, source))?;

    // The response has no length framing; the peer closing its side is the
    // end-of-response signal. No read timeout here: a peer that never
    // closes stalls startup.
    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .await
        .map_err(|source| io_error(endpoint, source))?;

    Table::parse(&String::from_utf8_lossy(&raw)).map_err(|source| FetchError::Malformed {
        endpoint: endpoint.clone(),
        source,
    })
}

fn io_error(endpoint: &Endpoint, source: io::Error) -> FetchError {
    FetchError::Io {
        endpoint: endpoint.clone(),
        source,
    }
}

/// Fetches every peer's table, all connections progressing together.
///
/// Returns tables in the same order as `peers`; the merge relies on that
/// order for its first-wins columns. Any single failure fails the whole
/// collection.
pub async fn collect(peers: &[Endpoint]) -> Result<Vec<Table>, FetchError> {
    try_join_all(peers.iter().map(fetch)).await
}
