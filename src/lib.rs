//! Merged statistics endpoint for a fleet of load balancers.
//!
//! The binary queries every configured peer for its `show stat` table,
//! reconciles the tables into one snapshot, and then answers the same
//! `show stat` protocol on a local endpoint so that clients only have to
//! query one place. Each module focuses on a concrete responsibility:
//!
//! - [`cli`] parses the command-line interface (listen endpoint plus peers).
//! - [`endpoint`] abstracts TCP addresses and Unix socket paths behind one
//!   connect/bind surface.
//! - [`wire`] implements the comma-delimited table format shared by peers
//!   and clients.
//! - [`peer`] fetches one table per peer and joins all fetches before the
//!   merge starts.
//! - [`merge`] reconciles the fetched tables column by column under the
//!   per-field aggregation policies.
//! - [`server`] serves the cached merged snapshot to inbound connections.
//!
//! Integration tests use this crate directly to exercise the collection,
//! merge, and serving phases against in-process fake peers.

pub mod cli;
pub mod endpoint;
pub mod merge;
pub mod peer;
pub mod server;
pub mod wire;
