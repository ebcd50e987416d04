//! HTTP transport to the panel.
//!
//! [`Transport`] is the seam between the client's cache logic and the network.
//! [`HttpTransport`] is the production implementation on top of a blocking
//! `reqwest` client; tests substitute their own.

use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::{Config, DEFAULT_RETRY_COUNT};
use crate::error::{Error, Result};

/// Node configuration endpoint.
pub const CONFIG_PATH: &str = "/api/v1/server/UniProxy/config";
/// User list endpoint.
pub const USER_PATH: &str = "/api/v1/server/UniProxy/user";
/// Traffic report endpoint.
pub const PUSH_PATH: &str = "/api/v1/server/UniProxy/push";
/// Online user report endpoint.
pub const ALIVE_PATH: &str = "/api/v1/server/UniProxy/alive";

const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP method of a panel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request to one of the panel endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: &'static str,
    /// ETag sent as `If-None-Match`
    pub if_none_match: Option<String>,
    /// JSON body
    pub body: Option<Vec<u8>>,
    /// Overrides the transport's default timeout for this call
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a GET request.
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::Get,
            path,
            if_none_match: None,
            body: None,
            timeout: None,
        }
    }

    /// Create a POST request with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(path: &'static str, body: &T) -> Result<Self> {
        let body = serde_json::to_vec(body)
            .map_err(|e| Error::Config(format!("encode {} body: {}", path, e)))?;
        Ok(Self {
            method: Method::Post,
            path,
            if_none_match: None,
            body: Some(body),
            timeout: None,
        })
    }

    /// Set the conditional-request ETag.
    pub fn if_none_match(mut self, etag: Option<String>) -> Self {
        self.if_none_match = etag.filter(|e| !e.is_empty());
        self
    }

    /// Bound this call by a timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A panel response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub etag: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with a status and body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            etag: None,
            body: body.into(),
        }
    }

    /// Attach an ETag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Check for `304 Not Modified`.
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with [`Error::Server`] unless the status is 2xx.
    pub fn ensure_success(&self, path: &str) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(Error::server(self.status, path, &self.body))
        }
    }
}

/// Executes panel requests.
///
/// Implementations own retries and timeouts. An `Err` means no usable
/// response was received; any HTTP status is returned as `Ok`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: Request) -> Result<Response> {
        (**self).execute(request)
    }
}

/// Blocking HTTP transport backed by `reqwest`.
///
/// Every request carries the `node_type`, `node_id` and `token` query
/// parameters. Failures without a response are retried with a linear backoff.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    query: Vec<(&'static str, String)>,
    retry_count: u32,
    debug: AtomicBool,
}

impl HttpTransport {
    /// Build a transport for the given config and normalized node type.
    pub fn new(config: &Config, node_type: &str) -> Result<Self> {
        let base_url = config.api_host.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("api_host is empty".to_string()));
        }

        let mut builder = reqwest::blocking::Client::builder().timeout(config.request_timeout());
        if let Some(ip) = config.send_ip()? {
            builder = builder.local_address(ip);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            query: vec![
                ("node_type", node_type.to_string()),
                ("node_id", config.node_id.to_string()),
                ("token", config.key.clone()),
            ],
            retry_count: DEFAULT_RETRY_COUNT,
            debug: AtomicBool::new(config.debug),
        })
    }

    /// Set how many times a failed request is retried.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Turn request/response logging on or off at runtime.
    pub fn set_debug(&self, enable: bool) {
        self.debug.store(enable, Ordering::Relaxed);
    }

    /// Check if request/response logging is on.
    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn send_once(&self, request: &Request) -> std::result::Result<Response, reqwest::Error> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        }
        .query(&self.query);

        if let Some(etag) = &request.if_none_match {
            builder = builder.header(IF_NONE_MATCH, etag.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
                .body(body.clone());
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();

        Ok(Response { status, etag, body })
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: Request) -> Result<Response> {
        // A caller-supplied timeout bounds the whole call, so it gets one attempt.
        let max_retries = if request.timeout.is_some() {
            0
        } else {
            self.retry_count
        };

        let mut attempt = 0;
        loop {
            let debug = self.is_debug();
            if debug {
                log::info!(
                    "{:?} {}{} if-none-match={:?}",
                    request.method,
                    self.base_url,
                    request.path,
                    request.if_none_match
                );
            }

            match self.send_once(&request) {
                Ok(response) => {
                    if debug {
                        log::info!(
                            "{} -> {} ({} bytes, etag={:?})",
                            request.path,
                            response.status,
                            response.body.len(),
                            response.etag
                        );
                    }
                    return Ok(response);
                }
                Err(e) if attempt < max_retries => {
                    attempt += 1;
                    log::warn!(
                        "Request {} failed (attempt {}/{}): {}",
                        request.path,
                        attempt,
                        max_retries + 1,
                        e
                    );
                    thread::sleep(Duration::from_millis(100 * u64::from(attempt)));
                }
                Err(e) => {
                    log::error!("Request {} failed: {}", request.path, e);
                    return Err(Error::transport(request.path, e));
                }
            }
        }
    }
}
