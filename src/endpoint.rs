//! Addressing for peers and the local listen socket.
//!
//! An address that begins with a path separator names a Unix domain socket;
//! anything else is treated as a TCP `host:port` address. Both kinds are
//! hidden behind [`Endpoint`] so the fetch and serve paths never branch on
//! transport outside this module.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
}

impl Endpoint {
    /// Binds a listener on this endpoint. A stale Unix socket file left
    /// behind by an unclean shutdown is removed first.
    pub async fn bind(&self) -> io::Result<Listener> {
        match self {
            Endpoint::Tcp(addr) => Ok(Listener::Tcp(TcpListener::bind(addr).await?)),
            Endpoint::Unix(path) => {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Ok(Listener::Unix(UnixListener::bind(path)?))
            }
        }
    }
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        if address.is_empty() {
            return Err("endpoint must not be empty".to_string());
        }
        if address.starts_with(std::path::MAIN_SEPARATOR) {
            Ok(Endpoint::Unix(PathBuf::from(address)))
        } else {
            Ok(Endpoint::Tcp(address.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{addr}"),
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A bound listener on either transport.
pub enum Listener {
    Tcp(TcpListener),
    Unix(UnixListener),
}

impl Listener {
    /// The endpoint the listener actually bound, with any ephemeral TCP
    /// port resolved.
    pub fn local_endpoint(&self) -> io::Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => Ok(Endpoint::Tcp(listener.local_addr()?.to_string())),
            Listener::Unix(listener) => {
                let addr = listener.local_addr()?;
                let path = addr.as_pathname().unwrap_or_else(|| Path::new(""));
                Ok(Endpoint::Unix(path.to_path_buf()))
            }
        }
    }

    pub async fn accept(&self) -> io::Result<Connection> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok(Connection::Tcp(stream, peer))
            }
            Listener::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok(Connection::Unix(stream))
            }
        }
    }
}

/// One accepted inbound connection.
pub enum Connection {
    Tcp(TcpStream, std::net::SocketAddr),
    Unix(UnixStream),
}

impl Connection {
    pub fn peer_desc(&self) -> String {
        match self {
            Connection::Tcp(_, peer) => peer.to_string(),
            Connection::Unix(_) => "unix client".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_separator_means_unix_socket() {
        assert_eq!(
            "/var/run/stats.sock".parse::<Endpoint>(),
            Ok(Endpoint::Unix(PathBuf::from("/var/run/stats.sock")))
        );
        assert_eq!(
            "127.0.0.1:7000".parse::<Endpoint>(),
            Ok(Endpoint::Tcp("127.0.0.1:7000".to_string()))
        );
        assert!("".parse::<Endpoint>().is_err());
    }

    #[tokio::test]
    async fn binds_over_a_stale_socket_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("stats.sock");
        std::fs::write(&path, b"stale").expect("write stale file");

        let endpoint = Endpoint::Unix(path.clone());
        let listener = endpoint.bind().await.expect("bind should replace the file");
        assert_eq!(
            listener.local_endpoint().expect("local endpoint"),
            Endpoint::Unix(path)
        );
    }
}
