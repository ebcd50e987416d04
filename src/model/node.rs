//! Protocol-specific node schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{lenient, CommonNode};
use crate::Protocol;

/// Protocol payload of a node; exactly one variant per decoded node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeConfig {
    Shadowsocks(ShadowsocksNode),
    VMess(VMessNode),
    Vless(VlessNode),
    Trojan(TrojanNode),
    Tuic(TuicNode),
    Hysteria(HysteriaNode),
    Hysteria2(Hysteria2Node),
    AnyTls(AnyTlsNode),
}

impl NodeConfig {
    /// Protocol of this payload.
    pub fn protocol(&self) -> Protocol {
        match self {
            NodeConfig::Shadowsocks(_) => Protocol::Shadowsocks,
            NodeConfig::VMess(_) => Protocol::VMess,
            NodeConfig::Vless(_) => Protocol::Vless,
            NodeConfig::Trojan(_) => Protocol::Trojan,
            NodeConfig::Tuic(_) => Protocol::Tuic,
            NodeConfig::Hysteria(_) => Protocol::Hysteria,
            NodeConfig::Hysteria2(_) => Protocol::Hysteria2,
            NodeConfig::AnyTls(_) => Protocol::AnyTls,
        }
    }

    /// Shared record embedded in the payload.
    pub fn common(&self) -> &CommonNode {
        match self {
            NodeConfig::Shadowsocks(n) => &n.common,
            NodeConfig::VMess(n) => &n.common,
            NodeConfig::Vless(n) => &n.common,
            NodeConfig::Trojan(n) => &n.common,
            NodeConfig::Tuic(n) => &n.common,
            NodeConfig::Hysteria(n) => &n.common,
            NodeConfig::Hysteria2(n) => &n.common,
            NodeConfig::AnyTls(n) => &n.common,
        }
    }

    /// Mutable access to the shared record.
    pub fn common_mut(&mut self) -> &mut CommonNode {
        match self {
            NodeConfig::Shadowsocks(n) => &mut n.common,
            NodeConfig::VMess(n) => &mut n.common,
            NodeConfig::Vless(n) => &mut n.common,
            NodeConfig::Trojan(n) => &mut n.common,
            NodeConfig::Tuic(n) => &mut n.common,
            NodeConfig::Hysteria(n) => &mut n.common,
            NodeConfig::Hysteria2(n) => &mut n.common,
            NodeConfig::AnyTls(n) => &mut n.common,
        }
    }
}

/// TLS / REALITY settings of VMess and VLESS nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_name: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub dest: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_port: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub short_id: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub private_key: String,
    #[serde(rename = "mldsa65Seed", deserialize_with = "lenient::null_default")]
    pub mldsa65_seed: String,
    #[serde(deserialize_with = "lenient::u64_from_str_or_number")]
    pub xver: u64,
}

/// VLESS encryption settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionSettings {
    #[serde(deserialize_with = "lenient::null_default")]
    pub mode: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub ticket: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_padding: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub private_key: String,
}

/// Local REALITY tuning; never sent by the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealityConfig {
    pub xver: u64,
    pub min_client_ver: String,
    pub max_client_ver: String,
    pub max_time_diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowsocksNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub cipher: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub server_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VMessNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub tls: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub tls_settings: TlsSettings,
    /// Older panels spell this `tlsSettings`
    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none")]
    pub tls_settings_legacy: Option<TlsSettings>,
    #[serde(deserialize_with = "lenient::null_default")]
    pub network: String,
    pub network_settings: Option<Value>,
    /// Older panels spell this `networkSettings`
    #[serde(rename = "networkSettings", skip_serializing_if = "Option::is_none")]
    pub network_settings_legacy: Option<Value>,
    #[serde(deserialize_with = "lenient::null_default")]
    pub encryption: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub encryption_settings: EncryptionSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VlessNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub tls: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub tls_settings: TlsSettings,
    /// Older panels spell this `tlsSettings`
    #[serde(rename = "tlsSettings", skip_serializing_if = "Option::is_none")]
    pub tls_settings_legacy: Option<TlsSettings>,
    #[serde(deserialize_with = "lenient::null_default")]
    pub network: String,
    pub network_settings: Option<Value>,
    /// Older panels spell this `networkSettings`
    #[serde(rename = "networkSettings", skip_serializing_if = "Option::is_none")]
    pub network_settings_legacy: Option<Value>,
    #[serde(deserialize_with = "lenient::null_default")]
    pub encryption: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub encryption_settings: EncryptionSettings,
    #[serde(deserialize_with = "lenient::null_default")]
    pub flow: String,
    #[serde(skip)]
    pub reality_config: RealityConfig,
}

impl VMessNode {
    /// Fold the legacy `networkSettings` / `tlsSettings` fields into their
    /// canonical counterparts.
    pub fn normalize_legacy(&mut self) {
        migrate_legacy(
            &mut self.network_settings,
            &mut self.network_settings_legacy,
            &mut self.tls_settings,
            &mut self.tls_settings_legacy,
        );
    }
}

impl VlessNode {
    /// Fold the legacy `networkSettings` / `tlsSettings` fields into their
    /// canonical counterparts.
    pub fn normalize_legacy(&mut self) {
        migrate_legacy(
            &mut self.network_settings,
            &mut self.network_settings_legacy,
            &mut self.tls_settings,
            &mut self.tls_settings_legacy,
        );
    }
}

fn migrate_legacy(
    network_settings: &mut Option<Value>,
    network_settings_legacy: &mut Option<Value>,
    tls_settings: &mut TlsSettings,
    tls_settings_legacy: &mut Option<TlsSettings>,
) {
    if let Some(legacy) = network_settings_legacy.take() {
        *network_settings = Some(legacy);
    }
    if let Some(legacy) = tls_settings_legacy.take() {
        *tls_settings = legacy;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrojanNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub network: String,
    #[serde(rename = "networkSettings")]
    pub network_settings: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuicNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub congestion_control: String,
    #[serde(deserialize_with = "lenient::null_default")]
    pub zero_rtt_handshake: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnyTlsNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(
        deserialize_with = "lenient::null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub padding_scheme: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteriaNode {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub up_mbps: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub down_mbps: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub obfs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hysteria2Node {
    #[serde(flatten)]
    pub common: CommonNode,
    #[serde(deserialize_with = "lenient::null_default")]
    pub ignore_client_bandwidth: bool,
    #[serde(deserialize_with = "lenient::null_default")]
    pub up_mbps: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub down_mbps: i64,
    #[serde(deserialize_with = "lenient::null_default")]
    pub obfs: String,
    #[serde(rename = "obfs-password", deserialize_with = "lenient::null_default")]
    pub obfs_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flattened_common() {
        let node: TrojanNode = serde_json::from_value(json!({
            "host": "t.example.com",
            "server_port": 443,
            "server_name": "sni.example.com",
            "network": "ws",
            "networkSettings": {"path": "/ws"}
        }))
        .unwrap();
        assert_eq!(node.common.host, "t.example.com");
        assert_eq!(node.common.server_port, 443);
        assert_eq!(node.common.server_name, "sni.example.com");
        assert_eq!(node.network, "ws");
        assert_eq!(node.network_settings, Some(json!({"path": "/ws"})));
    }

    #[test]
    fn test_tls_settings_xver_forms() {
        let a: TlsSettings = serde_json::from_value(json!({"xver": "1"})).unwrap();
        let b: TlsSettings = serde_json::from_value(json!({"xver": 2})).unwrap();
        let c: TlsSettings = serde_json::from_value(json!({"xver": ""})).unwrap();
        assert_eq!((a.xver, b.xver, c.xver), (1, 2, 0));
        assert!(serde_json::from_value::<TlsSettings>(json!({"xver": "x"})).is_err());
    }

    #[test]
    fn test_vmess_normalize_network_settings() {
        let mut node: VMessNode = serde_json::from_value(json!({
            "network": "ws",
            "networkSettings": {"path": "/legacy"}
        }))
        .unwrap();
        assert!(node.network_settings.is_none());

        node.normalize_legacy();
        assert_eq!(node.network_settings, Some(json!({"path": "/legacy"})));
        assert!(node.network_settings_legacy.is_none());
    }

    #[test]
    fn test_vless_normalize_tls_settings() {
        let mut node: VlessNode = serde_json::from_value(json!({
            "tls": 2,
            "tls_settings": {"server_name": "canonical.com"},
            "tlsSettings": {"server_name": "legacy.com", "short_id": "ab"}
        }))
        .unwrap();

        node.normalize_legacy();
        assert_eq!(node.tls_settings.server_name, "legacy.com");
        assert_eq!(node.tls_settings.short_id, "ab");
        assert!(node.tls_settings_legacy.is_none());
    }

    #[test]
    fn test_normalize_keeps_canonical_when_no_legacy() {
        let mut node: VMessNode = serde_json::from_value(json!({
            "network_settings": {"path": "/canonical"},
            "tls_settings": {"server_name": "canonical.com"}
        }))
        .unwrap();

        node.normalize_legacy();
        assert_eq!(node.network_settings, Some(json!({"path": "/canonical"})));
        assert_eq!(node.tls_settings.server_name, "canonical.com");
    }

    #[test]
    fn test_anytls_null_padding() {
        let node: AnyTlsNode =
            serde_json::from_value(json!({"server_port": 8443, "padding_scheme": null})).unwrap();
        assert!(node.padding_scheme.is_empty());
    }

    #[test]
    fn test_node_config_serializes_with_tag() {
        let config = NodeConfig::Hysteria2(Hysteria2Node {
            obfs: "salamander".to_string(),
            ..Default::default()
        });
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["hysteria2"]["obfs"], "salamander");
        assert_eq!(config.protocol(), Protocol::Hysteria2);
    }
}
