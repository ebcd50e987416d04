//! Supported node protocols.

use std::fmt;

/// Protocol represents the proxy protocol a node is configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Shadowsocks,
    VMess,
    Vless,
    Trojan,
    Tuic,
    Hysteria,
    Hysteria2,
    AnyTls,
}

impl Protocol {
    /// All supported protocols.
    pub const ALL: [Protocol; 8] = [
        Protocol::Shadowsocks,
        Protocol::VMess,
        Protocol::Vless,
        Protocol::Trojan,
        Protocol::Tuic,
        Protocol::Hysteria,
        Protocol::Hysteria2,
        Protocol::AnyTls,
    ];

    /// Parse a protocol from a node type tag (case-insensitive).
    ///
    /// Accepts the historical `v2ray` alias for VMess.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "shadowsocks" => Some(Protocol::Shadowsocks),
            "vmess" | "v2ray" => Some(Protocol::VMess),
            "vless" => Some(Protocol::Vless),
            "trojan" => Some(Protocol::Trojan),
            "tuic" => Some(Protocol::Tuic),
            "hysteria" => Some(Protocol::Hysteria),
            "hysteria2" => Some(Protocol::Hysteria2),
            "anytls" => Some(Protocol::AnyTls),
            _ => None,
        }
    }

    /// Get the canonical node type tag sent to the panel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Shadowsocks => "shadowsocks",
            Protocol::VMess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Tuic => "tuic",
            Protocol::Hysteria => "hysteria",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::AnyTls => "anytls",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a configured node type tag.
///
/// The tag is lowercased and `v2ray` is rewritten to `vmess`. Unknown tags are
/// kept as-is (lowercased) with a warning so newer panel protocols do not
/// break construction; they only fail once a payload has to be decoded.
pub fn normalize_node_type(node_type: &str) -> (String, Option<Protocol>) {
    let lowered = node_type.to_lowercase();
    match Protocol::parse(&lowered) {
        Some(protocol) => (protocol.as_str().to_string(), Some(protocol)),
        None => {
            log::warn!("Unknown node type: {}", lowered);
            (lowered, None)
        }
    }
}
