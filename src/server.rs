//! Serving the merged snapshot over the `show stat` protocol.
//!
//! The snapshot is encoded once, before the first accept, and every
//! connection task gets a shared read-only handle to it. Per connection the
//! server reads one command line, answers with either the snapshot or a
//! usage message, and closes.

use std::{future::Future, io, sync::Arc};

use anyhow::Result;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    select,
};
use tracing::{debug, info, warn};

use crate::{
    endpoint::{Connection, Endpoint, Listener},
    wire::STAT_COMMAND,
};

/// Reply for anything that is not the stat command. Unknown commands are
/// answered and the connection closed normally; they are never fatal.
pub const USAGE: &str = "Unknown command. Please enter one of the following commands only :\n  \
     show stat      : report counters for each proxy and server\n\n";

pub struct StatsServer {
    listener: Listener,
    snapshot: Arc<str>,
}

impl StatsServer {
    /// Takes ownership of a bound listener and the encoded merged table.
    /// The snapshot never changes for the lifetime of the server.
    pub fn new(listener: Listener, snapshot: Arc<str>) -> Self {
        Self { listener, snapshot }
    }

    pub fn local_endpoint(&self) -> io::Result<Endpoint> {
        self.listener.local_endpoint()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let StatsServer { listener, snapshot } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("stats endpoint shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    handle_accept_result(accepted, &snapshot);
                }
            }
        }

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

fn handle_accept_result(result: io::Result<Connection>, snapshot: &Arc<str>) {
    match result {
        Ok(connection) => spawn_connection_handler(connection, snapshot),
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(connection: Connection, snapshot: &Arc<str>) {
    let peer = connection.peer_desc();
    match connection {
        Connection::Tcp(stream, _) => spawn_handler(stream, peer, snapshot),
        Connection::Unix(stream) => spawn_handler(stream, peer, snapshot),
    }
}

fn spawn_handler<S>(stream: S, peer: String, snapshot: &Arc<str>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let snapshot = Arc::clone(snapshot);
    tokio::spawn(async move {
        if let Err(err) = handle_connection(stream, snapshot).await {
            warn!(peer = %peer, error = ?err, "client connection closed with error");
        }
    });
}

/// Answers one client: read a single command line, reply, close.
async fn handle_connection<S>(stream: S, snapshot: Arc<str>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let mut line = String::new();
    let bytes = reader.read_line(&mut line).await?;
    if bytes == 0 {
        // Client went away without sending a command.
        debug!("client closed before sending a command");
        return Ok(());
    }

    let reply = if line.trim_end_matches(['\r', '\n']) == STAT_COMMAND {
        debug!("serving merged snapshot");
        &*snapshot
    } else {
        debug!(command = %line.trim_end(), "unknown command");
        USAGE
    };

    writer.write_all(reply.as_bytes()).await?;
    writer.flush().await?;
    writer.shutdown().await?;
    Ok(())
}
