//! UniProxy - a panel client for proxy nodes.
//!
//! This crate polls a control panel over the UniProxy HTTP API for a node's
//! configuration and authorized users, and reports traffic and online users
//! back. It carries no proxy traffic itself.
//!
//! # Features
//!
//! - **Conditional fetches**: ETag-based requests (304 Not Modified) plus a
//!   content hash that catches panels re-issuing ETags for identical bodies
//! - **Protocol dispatch**: Shadowsocks, VMess, VLESS, Trojan, TUIC,
//!   Hysteria, Hysteria2 and AnyTLS node schemas
//! - **Legacy fields**: old `networkSettings` / `tlsSettings` spellings are
//!   folded into their canonical fields
//! - **Route extraction**: block rules, DNS servers and intervals pulled out of
//!   the panel's generic route list
//! - **Thread-safe**: one client can be polled from many threads
//!
//! # Quick Start
//!
//! ```ignore
//! use uniproxy::{Client, Config, FetchOutcome};
//!
//! let config = Config::new("https://panel.example.com", "token", 1, "vless");
//! let client = Client::new(&config)?;
//!
//! match client.get_node_info()? {
//!     FetchOutcome::Changed(node) => println!("new config: {:?}", node.security),
//!     FetchOutcome::Unchanged => println!("keep current config"),
//! }
//!
//! for user in client.get_user_list()? {
//!     println!("{} {}", user.id, user.uuid);
//! }
//! ```
//!
//! # Decoding Without a Client
//!
//! ```
//! use uniproxy::{dispatch, Security};
//!
//! let body = br#"{"server_port": 443, "tls": 2, "routes": [
//!     {"id": 1, "match": "protocol:bittorrent", "action": "block"}
//! ]}"#;
//! let node = dispatch::parse(1, "vless", body).unwrap();
//! assert_eq!(node.security, Security::Reality);
//! assert_eq!(node.rules.protocol, vec!["bittorrent"]);
//! ```

mod cache;
mod client;
mod config;
mod error;
mod protocol;

pub mod dispatch;
pub mod model;
pub mod rules;
pub mod transport;

// Re-export core types
pub use cache::{body_hash, CacheSnapshot, FetchOutcome};
pub use client::Client;
pub use config::{Config, DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT};
pub use error::{Error, Result, BODY_SNIPPET_LIMIT};
pub use protocol::{normalize_node_type, Protocol};

// Re-export model types
pub use model::{CommonNode, NodeConfig, NodeInfo, Route, RouteMatch, Security, UserInfo};
pub use rules::{CompiledRules, DnsEntry, RawDns, Rules};

// Re-export transport types
pub use transport::{HttpTransport, Request, Response, Transport};
