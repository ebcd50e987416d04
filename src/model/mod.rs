//! Panel data model.
//!
//! [`NodeInfo`] is the decoded result of one node configuration fetch. Its
//! protocol payload lives in [`NodeConfig`], one variant per supported
//! protocol, each embedding the shared [`CommonNode`] record.

mod node;
mod user;

pub use node::{
    AnyTlsNode, EncryptionSettings, Hysteria2Node, HysteriaNode, NodeConfig, RealityConfig,
    ShadowsocksNode, TlsSettings, TrojanNode, TuicNode, VMessNode, VlessNode,
};
pub use user::{group_online_ips, AliveMap, OnlineUser, UserInfo, UserListBody, UserTraffic};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::mem;
use std::time::Duration;

use crate::rules::{RawDns, Rules};
use crate::Protocol;

/// Transport security mode of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u8)]
pub enum Security {
    /// Plain transport
    #[default]
    None = 0,
    /// TLS
    Tls = 1,
    /// REALITY
    Reality = 2,
}

impl Security {
    /// Convert from the panel's `tls` integer.
    ///
    /// Returns `None` for values outside the known range.
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            0 => Some(Security::None),
            1 => Some(Security::Tls),
            2 => Some(Security::Reality),
            _ => None,
        }
    }

    /// Convert to the panel's `tls` integer.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Decoded configuration of one panel node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    /// Node id assigned by the panel
    pub id: i64,
    /// Transport security mode
    pub security: Security,
    /// How often traffic should be pushed to the panel
    pub push_interval: Duration,
    /// How often configuration should be pulled from the panel
    pub pull_interval: Duration,
    /// DNS configuration extracted from the routes
    pub raw_dns: RawDns,
    /// Block rules extracted from the routes
    pub rules: Rules,
    /// Protocol-specific payload
    pub config: NodeConfig,
}

impl NodeInfo {
    /// Protocol of this node, fixed by the payload variant.
    pub fn protocol(&self) -> Protocol {
        self.config.protocol()
    }

    /// Node type tag, e.g. `"vmess"`.
    pub fn node_type(&self) -> &'static str {
        self.config.protocol().as_str()
    }

    /// Shared record of the payload.
    ///
    /// Its routes and base config are already consumed and always empty.
    pub fn common(&self) -> &CommonNode {
        self.config.common()
    }
}

/// Fields shared by every protocol payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonNode {
    #[serde(deserialize_with = "lenient::null_default")]
    pub host: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_port: u16,
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_name: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub routes: Vec<Route>,
    pub base_config: Option<BaseConfig>,
}

impl CommonNode {
    /// Take the routes and base config out of this record, leaving them empty.
    pub fn take_routing(&mut self) -> (Vec<Route>, Option<BaseConfig>) {
        (mem::take(&mut self.routes), self.base_config.take())
    }
}

/// One routing entry configured on the panel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    #[serde(deserialize_with = "lenient::null_default")]
    pub id: i64,
    #[serde(rename = "match")]
    pub matches: RouteMatch,
    #[serde(deserialize_with = "lenient::null_default")]
    pub action: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub action_value: String,
}

/// The `match` value of a route, which panels send in several shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteMatch {
    /// Comma-joined tokens
    Text(String),
    /// List of tokens
    List(Vec<String>),
    /// List with non-string elements mixed in
    Mixed(Vec<Value>),
    /// Anything else, including null
    Other(Value),
}

impl Default for RouteMatch {
    fn default() -> Self {
        RouteMatch::Other(Value::Null)
    }
}

impl RouteMatch {
    /// Normalize into an ordered list of tokens.
    ///
    /// Strings are split on commas, non-string list elements are dropped and
    /// any other shape yields no tokens.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            RouteMatch::Text(s) => s.split(',').map(str::to_string).collect(),
            RouteMatch::List(items) => items.clone(),
            RouteMatch::Mixed(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            RouteMatch::Other(_) => Vec::new(),
        }
    }
}

/// Interval settings; values arrive as integers, numeric strings or floats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    pub push_interval: Value,
    pub pull_interval: Value,
}

/// Deserializers tolerating the loose typing of panel payloads.
pub(crate) mod lenient {
    use serde::{de::Error as DeError, Deserialize, Deserializer};

    /// Treat `null` as the type's default value.
    pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Accept an unsigned integer either as a number or a decimal string.
    pub fn u64_from_str_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
            Null(()),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(n),
            Raw::Str(s) if s.trim().is_empty() => Ok(0),
            Raw::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid unsigned integer: {}", s))),
            Raw::Null(()) => Ok(0),
        }
    }
}
