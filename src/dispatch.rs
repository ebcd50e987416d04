//! Protocol dispatch: decode a node payload into the schema of its protocol.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::{
    AnyTlsNode, Hysteria2Node, HysteriaNode, NodeConfig, NodeInfo, Security, ShadowsocksNode,
    TrojanNode, TuicNode, VMessNode, VlessNode,
};
use crate::rules::extract;
use crate::Protocol;

/// Decode a node payload for the given node type tag.
///
/// Returns [`Error::UnsupportedProtocol`] if the tag names no known protocol.
pub fn parse(node_id: i64, node_type: &str, body: &[u8]) -> Result<NodeInfo> {
    let protocol =
        Protocol::parse(node_type).ok_or_else(|| Error::UnsupportedProtocol(node_type.to_string()))?;
    parse_protocol(node_id, protocol, body)
}

/// Decode a node payload for a known protocol.
///
/// Legacy field spellings are folded into their canonical fields, the routing
/// section is extracted into rules, DNS and intervals, and the common record's
/// routes and base config are cleared afterwards.
pub fn parse_protocol(node_id: i64, protocol: Protocol, body: &[u8]) -> Result<NodeInfo> {
    let (mut config, security) = match protocol {
        Protocol::Shadowsocks => (
            NodeConfig::Shadowsocks(decode::<ShadowsocksNode>(protocol, body)?),
            Security::None,
        ),
        Protocol::VMess => {
            let mut node = decode::<VMessNode>(protocol, body)?;
            node.normalize_legacy();
            let security = tls_security(protocol, node.tls)?;
            (NodeConfig::VMess(node), security)
        }
        Protocol::Vless => {
            let mut node = decode::<VlessNode>(protocol, body)?;
            node.normalize_legacy();
            let security = tls_security(protocol, node.tls)?;
            (NodeConfig::Vless(node), security)
        }
        Protocol::Trojan => (
            NodeConfig::Trojan(decode::<TrojanNode>(protocol, body)?),
            Security::Tls,
        ),
        Protocol::Tuic => (
            NodeConfig::Tuic(decode::<TuicNode>(protocol, body)?),
            Security::Tls,
        ),
        Protocol::Hysteria => (
            NodeConfig::Hysteria(decode::<HysteriaNode>(protocol, body)?),
            Security::Tls,
        ),
        Protocol::Hysteria2 => (
            NodeConfig::Hysteria2(decode::<Hysteria2Node>(protocol, body)?),
            Security::Tls,
        ),
        Protocol::AnyTls => (
            NodeConfig::AnyTls(decode::<AnyTlsNode>(protocol, body)?),
            Security::Tls,
        ),
    };

    let (routes, base_config) = config.common_mut().take_routing();
    let extraction = extract(&routes, base_config.as_ref());

    log::debug!(
        "Parsed {} node {}: {} block patterns, {} blocked protocols, {} dns servers",
        protocol,
        node_id,
        extraction.rules.regexp.len(),
        extraction.rules.protocol.len(),
        extraction.raw_dns.dns_map.len()
    );

    Ok(NodeInfo {
        id: node_id,
        security,
        push_interval: extraction.push_interval,
        pull_interval: extraction.pull_interval,
        raw_dns: extraction.raw_dns,
        rules: extraction.rules,
        config,
    })
}

fn decode<T: DeserializeOwned>(protocol: Protocol, body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|source| Error::Decode {
        protocol: protocol.as_str(),
        source,
    })
}

fn tls_security(protocol: Protocol, tls: i64) -> Result<Security> {
    Security::from_i64(tls).ok_or(Error::UnknownSecurity {
        protocol: protocol.as_str(),
        tls,
    })
}
