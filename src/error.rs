//! Error types for uniproxy.

use thiserror::Error;

/// Maximum number of body bytes kept in a [`Error::Server`] message.
pub const BODY_SNIPPET_LIMIT: usize = 256;

/// Error type for uniproxy operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response (connect failure, timeout, cancellation)
    #[error("request {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The panel answered with an error status
    #[error("request {path} failed with status: {status}, body: {body}")]
    Server {
        status: u16,
        path: String,
        body: String,
    },

    /// Node payload did not match the schema of its protocol
    #[error("decode {protocol} params error: {source}")]
    Decode {
        protocol: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// VMess/VLESS payload carries a `tls` mode outside none/tls/reality
    #[error("decode {protocol} params error: unknown tls mode {tls}")]
    UnknownSecurity { protocol: &'static str, tls: i64 },

    /// User list payload could not be decoded
    #[error("decode user list error: {0}")]
    UserListDecode(#[source] serde_json::Error),

    /// Node type has no registered schema
    #[error("unsupported node type: {0}")]
    UnsupportedProtocol(String),

    /// Block rule pattern is not a valid regular expression
    #[error("invalid block pattern: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Build a server error, truncating the body to [`BODY_SNIPPET_LIMIT`] bytes.
    pub fn server(status: u16, path: &str, body: &[u8]) -> Self {
        Error::Server {
            status,
            path: path.to_string(),
            body: snippet(body),
        }
    }

    /// Wrap a transport failure for the given path.
    pub fn transport<E>(path: &str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Transport {
            path: path.to_string(),
            source: source.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if the panel answered with a 4xx/5xx status.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(400..=599))
    }

    /// Check if no response was received at all.
    pub fn is_network_error(&self) -> bool {
        matches!(self, Error::Transport { .. })
    }

    /// Check if a response arrived but its payload could not be decoded.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. } | Error::UnknownSecurity { .. } | Error::UserListDecode(_)
        )
    }
}

fn snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= BODY_SNIPPET_LIMIT {
        return text.into_owned();
    }
    let mut end = BODY_SNIPPET_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Result type alias for uniproxy operations.
pub type Result<T> = std::result::Result<T, Error>;
