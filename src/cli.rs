use clap::Parser;

use crate::endpoint::Endpoint;

/// Collects `show stat` snapshots from a fleet of load balancers, merges
/// them into one table, and serves the merged table on a local endpoint.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Endpoint to serve the merged table on. A leading path separator
    /// means a Unix domain socket, anything else is a TCP address.
    pub listen: Endpoint,

    /// Peer endpoints to pull statistics from, in merge order.
    #[arg(required = true)]
    pub peers: Vec<Endpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_listen_and_peers() {
        let cli = Cli::try_parse_from([
            "stats-mesh",
            "/run/stats.sock",
            "/run/lb1.sock",
            "10.0.0.2:9000",
        ])
        .expect("valid arguments");

        assert_eq!(cli.listen, Endpoint::Unix(PathBuf::from("/run/stats.sock")));
        assert_eq!(
            cli.peers,
            vec![
                Endpoint::Unix(PathBuf::from("/run/lb1.sock")),
                Endpoint::Tcp("10.0.0.2:9000".to_string()),
            ]
        );
    }

    #[test]
    fn requires_at_least_one_peer() {
        assert!(Cli::try_parse_from(["stats-mesh", "/run/stats.sock"]).is_err());
    }
}
