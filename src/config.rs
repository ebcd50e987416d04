//! Panel connection configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Request timeout used when the configuration leaves it at zero.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Number of times a failed request is retried by the HTTP transport.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Configuration for a panel client.
///
/// Can be built in code or loaded from YAML:
///
/// ```yaml
/// api_host: https://panel.example.com
/// key: secret-token
/// node_id: 1
/// node_type: vless
/// timeout: 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Panel base URL
    pub api_host: String,
    /// Local source IP for outbound requests
    #[serde(default)]
    pub api_send_ip: Option<String>,
    /// Node id assigned by the panel
    pub node_id: i64,
    /// Panel communication token
    pub key: String,
    /// Node type tag (`vmess`, `vless`, `trojan`, ...)
    pub node_type: String,
    /// Request timeout in seconds (0 = default)
    #[serde(default)]
    pub timeout: u64,
    /// Log every request and response
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    /// Create a new Config with default timeout and no source IP.
    pub fn new(
        api_host: impl Into<String>,
        key: impl Into<String>,
        node_id: i64,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            api_send_ip: None,
            node_id,
            key: key.into(),
            node_type: node_type.into(),
            timeout: 0,
            debug: false,
        }
    }

    /// Set the request timeout in seconds.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = secs;
        self
    }

    /// Bind outbound requests to a local source IP.
    pub fn with_send_ip(mut self, ip: impl Into<String>) -> Self {
        self.api_send_ip = Some(ip.into());
        self
    }

    /// Enable request/response logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Parse a Config from YAML content.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a Config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Effective request timeout.
    pub fn request_timeout(&self) -> Duration {
        if self.timeout > 0 {
            Duration::from_secs(self.timeout)
        } else {
            DEFAULT_TIMEOUT
        }
    }

    /// Parsed local source IP, if one is configured.
    pub fn send_ip(&self) -> Result<Option<IpAddr>> {
        match self.api_send_ip.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(ip) => ip
                .parse()
                .map(Some)
                .map_err(|_| Error::Config(format!("invalid api_send_ip: {}", ip))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("https://panel.example.com", "token", 7, "vless");
        assert_eq!(config.request_timeout(), DEFAULT_TIMEOUT);
        assert_eq!(config.send_ip().unwrap(), None);
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builders() {
        let config = Config::new("https://panel.example.com", "token", 7, "vless")
            .with_timeout(12)
            .with_send_ip("10.0.0.2")
            .with_debug(true);
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
        assert_eq!(config.send_ip().unwrap(), Some("10.0.0.2".parse().unwrap()));
        assert!(config.debug);
    }

    #[test]
    fn test_invalid_send_ip() {
        let config = Config::new("https://panel.example.com", "token", 7, "vless")
            .with_send_ip("not-an-ip");
        assert!(matches!(config.send_ip(), Err(Error::Config(_))));
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
api_host: https://panel.example.com
key: secret
node_id: 3
node_type: V2ray
timeout: 10
"#;
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.api_host, "https://panel.example.com");
        assert_eq!(config.node_id, 3);
        assert_eq!(config.node_type, "V2ray");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.api_send_ip, None);
    }

    #[test]
    fn test_from_yaml_missing_field() {
        let yaml = "api_host: https://panel.example.com\nnode_id: 3\n";
        assert!(matches!(Config::from_yaml_str(yaml), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_host: http://127.0.0.1:8080\nkey: k\nnode_id: 1\nnode_type: trojan\napi_send_ip: 127.0.0.1"
        )
        .unwrap();

        let config = Config::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.node_type, "trojan");
        assert_eq!(config.send_ip().unwrap(), Some("127.0.0.1".parse().unwrap()));
    }
}
