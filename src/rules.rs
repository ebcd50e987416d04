//! Block rule and DNS extraction from panel routes.
//!
//! The panel ships routing as a flat list of [`Route`] entries. Two actions are
//! understood:
//!
//! - `block`: each token is either `protocol:<name>` (a blocked sniffed
//!   protocol) or a domain regular expression, optionally prefixed `regexp:`.
//! - `dns`: tokens are the domains served by the DNS server in
//!   `action_value`, unless the first token is `main`, in which case the
//!   remaining tokens form a raw DNS configuration override.
//!
//! Every other action is ignored.

use ahash::AHashMap;
use regex::RegexSet;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::model::{BaseConfig, Route};

const PROTOCOL_PREFIX: &str = "protocol:";
const REGEXP_PREFIX: &str = "regexp:";
const MAIN_DNS: &str = "main";

/// Block rules collected from `block` routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Rules {
    /// Blocked domain patterns
    pub regexp: Vec<String>,
    /// Blocked protocols
    pub protocol: Vec<String>,
}

impl Rules {
    /// Compile the patterns for matching.
    ///
    /// Empty patterns (from trailing commas or a bare `regexp:`) are skipped;
    /// they would otherwise match every domain.
    pub fn compile(&self) -> Result<CompiledRules> {
        Ok(CompiledRules {
            regexps: RegexSet::new(self.regexp.iter().filter(|p| !p.is_empty()))?,
            protocols: self.protocol.clone(),
        })
    }

    /// Check if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.regexp.is_empty() && self.protocol.is_empty()
    }
}

/// Block rules ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    regexps: RegexSet,
    protocols: Vec<String>,
}

impl CompiledRules {
    /// Check if a domain matches any blocked pattern.
    pub fn is_blocked_domain(&self, domain: &str) -> bool {
        self.regexps.is_match(domain)
    }

    /// Check if a sniffed protocol is blocked (case-insensitive).
    pub fn blocks_protocol(&self, protocol: &str) -> bool {
        self.protocols
            .iter()
            .any(|p| p.eq_ignore_ascii_case(protocol))
    }
}

/// A DNS server and the domains it resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DnsEntry {
    pub address: String,
    pub domains: Vec<String>,
}

/// DNS configuration collected from `dns` routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawDns {
    /// Per-route servers, keyed by route position
    pub dns_map: AHashMap<String, DnsEntry>,
    /// Raw DNS configuration override from the last `main` route
    pub dns_json: Option<String>,
}

/// Everything extracted from a node's routing section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub rules: Rules,
    pub raw_dns: RawDns,
    pub push_interval: Duration,
    pub pull_interval: Duration,
}

/// Extract block rules, DNS configuration and intervals.
pub fn extract(routes: &[Route], base_config: Option<&BaseConfig>) -> Extraction {
    let mut out = Extraction::default();

    for (index, route) in routes.iter().enumerate() {
        let tokens = route.matches.tokens();
        match route.action.as_str() {
            "block" => {
                for token in tokens {
                    if let Some(protocol) = token.strip_prefix(PROTOCOL_PREFIX) {
                        out.rules.protocol.push(protocol.to_string());
                    } else {
                        let pattern = token.strip_prefix(REGEXP_PREFIX).unwrap_or(&token);
                        out.rules.regexp.push(pattern.to_string());
                    }
                }
            }
            "dns" => {
                if tokens.first().is_some_and(|t| t != MAIN_DNS) {
                    out.raw_dns.dns_map.insert(
                        index.to_string(),
                        DnsEntry {
                            address: route.action_value.clone(),
                            domains: tokens,
                        },
                    );
                } else if tokens.len() > 1 {
                    out.raw_dns.dns_json = Some(tokens[1..].concat());
                }
            }
            other => log::trace!("Ignoring route {} with action {:?}", route.id, other),
        }
    }

    if let Some(base) = base_config {
        out.push_interval = interval_to_duration(&base.push_interval);
        out.pull_interval = interval_to_duration(&base.pull_interval);
    }

    out
}

/// Convert a loosely typed interval (seconds) into a duration.
///
/// Integers and floats are taken as whole seconds, numeric strings are parsed,
/// and anything else (non-numeric strings, null, negatives) yields zero.
pub fn interval_to_duration(value: &Value) -> Duration {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_u64() {
                Duration::from_secs(secs)
            } else if let Some(secs) = n.as_f64() {
                whole_secs(secs as i64)
            } else {
                Duration::ZERO
            }
        }
        Value::String(s) => s.parse::<i64>().map(whole_secs).unwrap_or_default(),
        _ => Duration::ZERO,
    }
}

fn whole_secs(secs: i64) -> Duration {
    Duration::from_secs(secs.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteMatch;
    use serde_json::json;

    fn route(id: i64, matches: Value, action: &str, action_value: &str) -> Route {
        Route {
            id,
            matches: serde_json::from_value::<RouteMatch>(matches).unwrap(),
            action: action.to_string(),
            action_value: action_value.to_string(),
        }
    }

    #[test]
    fn test_block_prefixes() {
        let routes = vec![route(1, json!("protocol:bittorrent,regexp:^evil"), "block", "")];
        let out = extract(&routes, None);
        assert_eq!(out.rules.protocol, vec!["bittorrent"]);
        assert_eq!(out.rules.regexp, vec!["^evil"]);
    }

    #[test]
    fn test_block_without_prefix() {
        let routes = vec![route(1, json!(["ads.example.com", "(.*\\.)?track\\.net"]), "block", "")];
        let out = extract(&routes, None);
        assert!(out.rules.protocol.is_empty());
        assert_eq!(out.rules.regexp, vec!["ads.example.com", "(.*\\.)?track\\.net"]);
    }

    #[test]
    fn test_dns_main_override() {
        let routes = vec![route(1, json!(["main", "8.8.8.8"]), "dns", "")];
        let out = extract(&routes, None);
        assert_eq!(out.raw_dns.dns_json.as_deref(), Some("8.8.8.8"));
        assert!(out.raw_dns.dns_map.is_empty());
    }

    #[test]
    fn test_dns_main_concatenates_without_separator() {
        let routes = vec![route(1, json!("main,{\"servers\":,[\"1.1.1.1\"]}"), "dns", "")];
        let out = extract(&routes, None);
        assert_eq!(
            out.raw_dns.dns_json.as_deref(),
            Some("{\"servers\":[\"1.1.1.1\"]}")
        );
    }

    #[test]
    fn test_dns_main_single_token() {
        let routes = vec![route(1, json!(["main"]), "dns", "1.1.1.1")];
        let out = extract(&routes, None);
        assert!(out.raw_dns.dns_json.is_none());
        assert!(out.raw_dns.dns_map.is_empty());
    }

    #[test]
    fn test_dns_map_keyed_by_position() {
        let routes = vec![
            route(10, json!("x"), "block", ""),
            route(11, json!("y"), "direct", ""),
            route(12, json!(["corp"]), "dns", "10.0.0.1"),
        ];
        let out = extract(&routes, None);
        let entry = out.raw_dns.dns_map.get("2").unwrap();
        assert_eq!(entry.address, "10.0.0.1");
        assert_eq!(entry.domains, vec!["corp"]);
        assert_eq!(out.raw_dns.dns_map.len(), 1);
    }

    #[test]
    fn test_dns_accumulates_across_routes() {
        let routes = vec![
            route(1, json!(["a.corp"]), "dns", "10.0.0.1"),
            route(2, json!(["main", "{}"]), "dns", ""),
            route(3, json!("b.corp,c.corp"), "dns", "10.0.0.2"),
        ];
        let out = extract(&routes, None);
        assert_eq!(out.raw_dns.dns_map.len(), 2);
        assert_eq!(out.raw_dns.dns_map.get("2").unwrap().domains, vec!["b.corp", "c.corp"]);
        assert_eq!(out.raw_dns.dns_json.as_deref(), Some("{}"));
    }

    #[test]
    fn test_unknown_action_ignored() {
        let routes = vec![route(1, json!("x"), "route", "out"), route(2, json!(null), "", "")];
        let out = extract(&routes, None);
        assert!(out.rules.is_empty());
        assert!(out.raw_dns.dns_map.is_empty());
        assert!(out.raw_dns.dns_json.is_none());
    }

    #[test]
    fn test_interval_coercion() {
        assert_eq!(interval_to_duration(&json!(30)), Duration::from_secs(30));
        assert_eq!(interval_to_duration(&json!("45")), Duration::from_secs(45));
        assert_eq!(interval_to_duration(&json!(60.0)), Duration::from_secs(60));
        assert_eq!(interval_to_duration(&json!(1.9)), Duration::from_secs(1));
        assert_eq!(interval_to_duration(&json!("abc")), Duration::ZERO);
        assert_eq!(interval_to_duration(&json!(-5)), Duration::ZERO);
        assert_eq!(interval_to_duration(&json!(null)), Duration::ZERO);
        assert_eq!(interval_to_duration(&json!([1])), Duration::ZERO);
        assert_eq!(interval_to_duration(&json!(true)), Duration::ZERO);
    }

    #[test]
    fn test_extract_intervals() {
        let base = BaseConfig {
            push_interval: json!(60),
            pull_interval: json!("120"),
        };
        let out = extract(&[], Some(&base));
        assert_eq!(out.push_interval, Duration::from_secs(60));
        assert_eq!(out.pull_interval, Duration::from_secs(120));

        let out = extract(&[], None);
        assert_eq!(out.push_interval, Duration::ZERO);
    }

    #[test]
    fn test_compiled_rules() {
        let rules = Rules {
            regexp: vec!["^ads\\.".to_string(), "tracker\\.com$".to_string()],
            protocol: vec!["BitTorrent".to_string()],
        };
        let compiled = rules.compile().unwrap();
        assert!(compiled.is_blocked_domain("ads.example.com"));
        assert!(compiled.is_blocked_domain("a.tracker.com"));
        assert!(!compiled.is_blocked_domain("example.com"));
        assert!(compiled.blocks_protocol("bittorrent"));
        assert!(!compiled.blocks_protocol("http"));
    }

    #[test]
    fn test_compile_invalid_pattern() {
        let rules = Rules {
            regexp: vec!["(unclosed".to_string()],
            protocol: Vec::new(),
        };
        assert!(matches!(rules.compile(), Err(crate::Error::InvalidRegex(_))));
    }

    #[test]
    fn test_compile_empty_matches_nothing() {
        let compiled = Rules::default().compile().unwrap();
        assert!(!compiled.is_blocked_domain("anything.com"));
    }

    #[test]
    fn test_compile_skips_empty_patterns() {
        let routes = vec![
            route(1, json!("ads.example.com,"), "block", ""),
            route(2, json!("regexp:"), "block", ""),
            route(3, json!(""), "block", ""),
        ];
        let out = extract(&routes, None);
        assert_eq!(out.rules.regexp, vec!["ads.example.com", "", "", ""]);

        let compiled = out.rules.compile().unwrap();
        assert!(compiled.is_blocked_domain("ads.example.com"));
        assert!(!compiled.is_blocked_domain("google.com"));
    }
}
