//! Panel client: conditional fetches of node config and users, and reports.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::time::Duration;

use crate::cache::{body_hash, CacheSnapshot, CacheState, FetchOutcome};
use crate::config::Config;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::model::{NodeInfo, UserInfo, UserListBody, UserTraffic};
use crate::protocol::normalize_node_type;
use crate::transport::{
    HttpTransport, Request, Transport, ALIVE_PATH, CONFIG_PATH, PUSH_PATH, USER_PATH,
};
use crate::Protocol;

/// Client for one node on a panel.
///
/// The client runs no background tasks; callers decide when to poll. It is
/// safe to share between threads: ETags, the last node config hash and the
/// last user list live behind one read/write lock, and every
/// "is this new? then record it" step happens under a single write guard.
///
/// # Example
///
/// ```ignore
/// use uniproxy::{Client, Config, FetchOutcome};
///
/// let client = Client::new(&Config::new("https://panel.example.com", "token", 1, "vless"))?;
///
/// if let FetchOutcome::Changed(node) = client.get_node_info()? {
///     println!("{} node on port {}", node.node_type(), node.common().server_port);
/// }
/// let users = client.get_user_list()?;
/// ```
pub struct Client<T = HttpTransport> {
    transport: T,
    node_id: i64,
    node_type: String,
    protocol: Option<Protocol>,
    state: RwLock<CacheState>,
}

impl Client<HttpTransport> {
    /// Create a client talking HTTP to the configured panel.
    ///
    /// An unknown node type is accepted with a warning; fetching node info
    /// for it fails with [`Error::UnsupportedProtocol`].
    pub fn new(config: &Config) -> Result<Self> {
        let (node_type, protocol) = normalize_node_type(&config.node_type);
        let transport = HttpTransport::new(config, &node_type)?;
        Ok(Self::assemble(config.node_id, node_type, protocol, transport))
    }

    /// Turn request/response logging on or off without rebuilding the client.
    pub fn set_debug(&self, enable: bool) {
        self.transport.set_debug(enable);
    }
}

impl<T: Transport> Client<T> {
    /// Create a client on top of a custom transport.
    pub fn with_transport(config: &Config, transport: T) -> Self {
        let (node_type, protocol) = normalize_node_type(&config.node_type);
        Self::assemble(config.node_id, node_type, protocol, transport)
    }

    fn assemble(node_id: i64, node_type: String, protocol: Option<Protocol>, transport: T) -> Self {
        Self {
            transport,
            node_id,
            node_type,
            protocol,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Node id this client reports for.
    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    /// Normalized node type tag.
    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    /// Protocol of the node, `None` for unknown node types.
    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    /// Get a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch the raw node config body.
    ///
    /// Returns [`FetchOutcome::Unchanged`] on `304 Not Modified` and when the
    /// body hashes the same as the last one seen, even under a new ETag. A new
    /// body is recorded before it is returned, so a body that later fails to
    /// decode still counts as seen.
    pub fn fetch_node_config(&self) -> Result<FetchOutcome<Vec<u8>>> {
        self.fetch_node_config_inner(None)
    }

    /// Like [`fetch_node_config`](Self::fetch_node_config), bounded by a timeout.
    ///
    /// A call that times out leaves the cache state untouched.
    pub fn fetch_node_config_within(&self, timeout: Duration) -> Result<FetchOutcome<Vec<u8>>> {
        self.fetch_node_config_inner(Some(timeout))
    }

    fn fetch_node_config_inner(&self, timeout: Option<Duration>) -> Result<FetchOutcome<Vec<u8>>> {
        let etag = self.state.read().node_etag.clone();

        let response = self.transport.execute(
            Request::get(CONFIG_PATH)
                .if_none_match(etag)
                .timeout(timeout),
        )?;

        if response.is_not_modified() {
            log::debug!("Node config not modified (304)");
            return Ok(FetchOutcome::Unchanged);
        }
        response.ensure_success(CONFIG_PATH)?;

        let hash = body_hash(&response.body);
        let mut state = self.state.write();
        if !state.commit_node(hash, response.etag.clone()) {
            log::debug!("Node config body unchanged, etag={:?}", response.etag);
            return Ok(FetchOutcome::Unchanged);
        }
        drop(state);

        log::debug!("Node config changed, etag={:?}", response.etag);
        Ok(FetchOutcome::Changed(response.body))
    }

    /// Fetch and decode the node config.
    pub fn get_node_info(&self) -> Result<FetchOutcome<NodeInfo>> {
        self.get_node_info_inner(None)
    }

    /// Like [`get_node_info`](Self::get_node_info), bounded by a timeout.
    pub fn get_node_info_within(&self, timeout: Duration) -> Result<FetchOutcome<NodeInfo>> {
        self.get_node_info_inner(Some(timeout))
    }

    fn get_node_info_inner(&self, timeout: Option<Duration>) -> Result<FetchOutcome<NodeInfo>> {
        // checked up front so an unknown type never marks a body as seen
        let protocol = self
            .protocol
            .ok_or_else(|| Error::UnsupportedProtocol(self.node_type.clone()))?;

        match self.fetch_node_config_inner(timeout)? {
            FetchOutcome::Unchanged => Ok(FetchOutcome::Unchanged),
            FetchOutcome::Changed(body) => Ok(FetchOutcome::Changed(dispatch::parse_protocol(
                self.node_id,
                protocol,
                &body,
            )?)),
        }
    }

    /// Forget the node config version, so the next fetch is decoded even if
    /// the panel serves the same body.
    pub fn reset_node_cache(&self) {
        self.state.write().reset_node();
    }

    /// Fetch the user list.
    ///
    /// On `304 Not Modified` the last decoded list is returned.
    pub fn get_user_list(&self) -> Result<Vec<UserInfo>> {
        self.get_user_list_inner(None)
    }

    /// Like [`get_user_list`](Self::get_user_list), bounded by a timeout.
    pub fn get_user_list_within(&self, timeout: Duration) -> Result<Vec<UserInfo>> {
        self.get_user_list_inner(Some(timeout))
    }

    fn get_user_list_inner(&self, timeout: Option<Duration>) -> Result<Vec<UserInfo>> {
        let etag = self.state.read().user_etag.clone();

        let response = self.transport.execute(
            Request::get(USER_PATH)
                .if_none_match(etag)
                .timeout(timeout),
        )?;

        if response.is_not_modified() {
            log::debug!("User list not modified (304)");
            return Ok(self.state.read().users.clone());
        }
        response.ensure_success(USER_PATH)?;

        let body: UserListBody =
            serde_json::from_slice(&response.body).map_err(Error::UserListDecode)?;

        log::debug!(
            "User list changed: {} users, etag={:?}",
            body.users.len(),
            response.etag
        );
        self.state
            .write()
            .commit_users(response.etag, body.users.clone());

        Ok(body.users)
    }

    /// Report per-user traffic as `{uid: [upload, download]}`.
    ///
    /// A uid listed twice keeps its last counters.
    pub fn report_user_traffic(&self, traffic: &[UserTraffic]) -> Result<()> {
        let payload: AHashMap<i64, [i64; 2]> = traffic
            .iter()
            .map(|t| (t.uid, [t.upload, t.download]))
            .collect();

        let response = self
            .transport
            .execute(Request::post_json(PUSH_PATH, &payload)?)?;
        response.ensure_success(PUSH_PATH)
    }

    /// Report online IPs per user.
    ///
    /// See [`group_online_ips`](crate::model::group_online_ips) to build the payload.
    pub fn report_node_online_users(&self, online: &AHashMap<i64, Vec<String>>) -> Result<()> {
        let response = self
            .transport
            .execute(Request::post_json(ALIVE_PATH, online)?)?;
        response.ensure_success(ALIVE_PATH)
    }

    /// Copy of the current cache state.
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.state.read().snapshot()
    }
}
