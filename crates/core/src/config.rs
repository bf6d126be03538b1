//! Provider configuration
//!
//! [`ProviderConfig`] is a plain value handed to the provider's `initialize`.
//! It can be assembled three ways:
//!
//! - [`ProviderConfig::builder`] in code
//! - [`ProviderConfig::from_properties`] from a property map using the
//!   `Connect String`, `Session Timeout`, `Root Node`, `Access Control` and
//!   `Connection Timeout` names
//! - [`ProviderConfig::from_toml_str`] / [`ProviderConfig::from_toml_file`]
//!
//! Building never fails on semantic problems; [`ProviderConfig::validate`]
//! does all checking so that `initialize` is the single place a
//! configuration error is raised.

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::limits::{
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_PAYLOAD_BYTES, DEFAULT_PORT, DEFAULT_ROOT_NODE,
    DEFAULT_SESSION_TIMEOUT, RESERVED_ROOT,
};
use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Property name of the coordination service endpoint list
pub const CONNECT_STRING: &str = "Connect String";
/// Property name of the session timeout
pub const SESSION_TIMEOUT: &str = "Session Timeout";
/// Property name of the root node path
pub const ROOT_NODE: &str = "Root Node";
/// Property name of the access control policy
pub const ACCESS_CONTROL: &str = "Access Control";
/// Property name of the connection timeout
pub const CONNECTION_TIMEOUT: &str = "Connection Timeout";

// ============================================================================
// Access control
// ============================================================================

/// Permission scheme applied to nodes the provider creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessControl {
    /// Readable and writable by anyone
    #[default]
    Open,
    /// Readable and writable only by the identity that created the node
    CreatorOnly,
}

impl AccessControl {
    /// Canonical property value
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessControl::Open => "Open",
            AccessControl::CreatorOnly => "CreatorOnly",
        }
    }
}

impl FromStr for AccessControl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "open" | "opentoworld" => Ok(AccessControl::Open),
            "creatoronly" => Ok(AccessControl::CreatorOnly),
            _ => Err(ConfigError::UnknownAccessControl(s.to_string())),
        }
    }
}

impl std::fmt::Display for AccessControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Credentials and TLS
// ============================================================================

/// Authentication presented when a session is opened
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    scheme: String,
    principal: String,
    secret: String,
}

impl Credentials {
    /// Credentials for an arbitrary scheme
    pub fn new(
        scheme: impl Into<String>,
        principal: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            principal: principal.into(),
            secret: secret.into(),
        }
    }

    /// Username/password credentials
    pub fn digest(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::new("digest", user, password)
    }

    /// Authentication scheme
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Authenticated principal
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Shared secret
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Identity recorded on creator-only nodes, `scheme:principal`
    pub fn identity(&self) -> String {
        format!("{}:{}", self.scheme, self.principal)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Pre-built secure transport context
///
/// The provider neither constructs nor inspects certificates. It hands the
/// context to the coordination backend, which downcasts it to whatever type
/// its transport expects.
#[derive(Clone)]
pub struct TlsContext {
    inner: Arc<dyn Any + Send + Sync>,
}

impl TlsContext {
    /// Wrap a backend-specific context
    pub fn new<T: Any + Send + Sync>(context: T) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    /// Borrow the wrapped context as `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TlsContext(..)")
    }
}

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded exponential backoff for connection attempts and retried operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts before giving up, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use statekeeper_core::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(100));
    /// assert_eq!(policy.backoff(2), Duration::from_millis(200));
    /// ```
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidRetryPolicy(format!(
                "multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigError::InvalidRetryPolicy(format!(
                "base_delay {:?} exceeds max_delay {:?}",
                self.base_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

// ============================================================================
// Connect string
// ============================================================================

/// One coordination server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl std::fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parsed connect string: a comma-separated `host[:port]` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectString {
    servers: Vec<ServerAddress>,
}

impl ConnectString {
    /// Parse a connect string
    ///
    /// # Examples
    ///
    /// ```
    /// use statekeeper_core::ConnectString;
    ///
    /// let cs = ConnectString::parse("zk1:2181,zk2").unwrap();
    /// assert_eq!(cs.servers().len(), 2);
    /// assert_eq!(cs.servers()[1].port, 2181);
    /// ```
    pub fn parse(input: &str) -> ConfigResult<Self> {
        let invalid = |reason: &str| ConfigError::InvalidConnectString {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        if trimmed.contains('/') {
            return Err(invalid("chroot suffixes are not supported, use the root node instead"));
        }

        let mut servers = Vec::new();
        for entry in trimmed.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(invalid("empty server entry"));
            }
            let (host, port) = match entry.rsplit_once(':') {
                Some((host, port)) => {
                    let port: u16 = port
                        .parse()
                        .map_err(|_| invalid(&format!("bad port in '{}'", entry)))?;
                    if port == 0 {
                        return Err(invalid(&format!("bad port in '{}'", entry)));
                    }
                    (host, port)
                }
                None => (entry, DEFAULT_PORT),
            };
            if host.is_empty() || host.chars().any(|c| c.is_whitespace() || c == ':') {
                return Err(invalid(&format!("bad host in '{}'", entry)));
            }
            servers.push(ServerAddress {
                host: host.to_string(),
                port,
            });
        }

        Ok(Self { servers })
    }

    /// Endpoints in the order given
    pub fn servers(&self) -> &[ServerAddress] {
        &self.servers
    }
}

impl std::fmt::Display for ConnectString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.servers.iter().map(ToString::to_string).collect();
        f.write_str(&joined.join(","))
    }
}

/// Check that `path` is an absolute, canonical node path
///
/// Rules: starts with `/`, no trailing `/` (except the root itself), no empty
/// segments, no `.` or `..` segments, no control characters, and not inside
/// the service's reserved subtree.
pub fn validate_node_path(path: &str) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidRootNode {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(invalid("must not end with '/'"));
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            _ => {}
        }
    }
    if path.chars().any(|c| c.is_control()) {
        return Err(invalid("control characters are not allowed"));
    }
    if path == RESERVED_ROOT || path.starts_with(&format!("{}/", RESERVED_ROOT)) {
        return Err(invalid("reserved by the coordination service"));
    }
    Ok(())
}

// ============================================================================
// ProviderConfig
// ============================================================================

/// Settings for a coordinated state provider
///
/// Immutable once the provider is enabled.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Name used in logs
    pub identifier: String,
    /// Coordination service endpoint list
    pub connect_string: String,
    /// Session timeout negotiated with the service
    pub session_timeout: Duration,
    /// How long `enable` waits for the first session
    pub connection_timeout: Duration,
    /// Node under which all component state lives
    pub root_node: String,
    /// ACL applied to created nodes
    pub access_control: AccessControl,
    /// Identity presented to the service
    pub credentials: Option<Credentials>,
    /// Pre-built secure transport context
    pub tls: Option<TlsContext>,
    /// Backoff for connection attempts and retried operations
    pub retry: RetryPolicy,
    /// Lowers the backend's payload ceiling when set
    pub max_payload_bytes: Option<usize>,
}

impl ProviderConfig {
    /// Start building a configuration for the given connect string
    pub fn builder(connect_string: impl Into<String>) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(connect_string)
    }

    /// Build a configuration from named properties
    ///
    /// `Connect String` is required; other properties fall back to defaults.
    pub fn from_properties(properties: &HashMap<String, String>) -> ConfigResult<Self> {
        let lookup = |name: &str| {
            properties
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let connect_string = lookup(CONNECT_STRING)
            .ok_or_else(|| ConfigError::MissingProperty(CONNECT_STRING.to_string()))?;

        let mut builder = ProviderConfig::builder(connect_string);
        if let Some(v) = lookup(SESSION_TIMEOUT) {
            builder = builder.session_timeout(parse_duration(v)?);
        }
        if let Some(v) = lookup(CONNECTION_TIMEOUT) {
            builder = builder.connection_timeout(parse_duration(v)?);
        }
        if let Some(v) = lookup(ROOT_NODE) {
            builder = builder.root_node(v);
        }
        if let Some(v) = lookup(ACCESS_CONTROL) {
            builder = builder.access_control(v.parse()?);
        }
        Ok(builder.build())
    }

    /// Parse a TOML document
    ///
    /// ```toml
    /// connect_string = "zk1:2181,zk2:2181"
    /// session_timeout = "3 secs"
    /// root_node = "/app/team1/testing"
    /// access_control = "Open"
    ///
    /// [retry]
    /// max_attempts = 3
    /// base_delay = "50 millis"
    /// ```
    pub fn from_toml_str(input: &str) -> ConfigResult<Self> {
        let file: ConfigFile = toml::from_str(input).map_err(|e| ConfigError::Load(e.to_string()))?;
        file.into_config()
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Check every setting, returning the parsed connect string
    pub fn validate(&self) -> ConfigResult<ConnectString> {
        let servers = ConnectString::parse(&self.connect_string)?;
        validate_node_path(&self.root_node)?;
        if self.root_node == "/" {
            return Err(ConfigError::InvalidRootNode {
                path: self.root_node.clone(),
                reason: "state cannot live directly under '/'".to_string(),
            });
        }
        if self.session_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                name: "session timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.connection_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                name: "connection timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.access_control == AccessControl::CreatorOnly && self.credentials.is_none() {
            return Err(ConfigError::MissingCredentials);
        }
        self.retry.validate()?;
        if let Some(limit) = self.max_payload_bytes {
            if limit == 0 {
                return Err(ConfigError::InvalidPayloadLimit(
                    "must be greater than zero".to_string(),
                ));
            }
        }
        Ok(servers)
    }
}

/// Builder for [`ProviderConfig`]
///
/// # Example
///
/// ```
/// use statekeeper_core::{AccessControl, ProviderConfig};
/// use std::time::Duration;
///
/// let config = ProviderConfig::builder("localhost:2181")
///     .root_node("/app/team1/testing")
///     .session_timeout(Duration::from_secs(3))
///     .access_control(AccessControl::Open)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ProviderConfigBuilder {
    config: ProviderConfig,
}

impl ProviderConfigBuilder {
    fn new(connect_string: impl Into<String>) -> Self {
        Self {
            config: ProviderConfig {
                identifier: "statekeeper".to_string(),
                connect_string: connect_string.into(),
                session_timeout: DEFAULT_SESSION_TIMEOUT,
                connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
                root_node: DEFAULT_ROOT_NODE.to_string(),
                access_control: AccessControl::Open,
                credentials: None,
                tls: None,
                retry: RetryPolicy::default(),
                max_payload_bytes: None,
            },
        }
    }

    /// Name used in logs
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Session timeout
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config.session_timeout = timeout;
        self
    }

    /// How long `enable` waits for the first session
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Root node path
    pub fn root_node(mut self, root: impl Into<String>) -> Self {
        self.config.root_node = root.into();
        self
    }

    /// ACL for created nodes
    pub fn access_control(mut self, access_control: AccessControl) -> Self {
        self.config.access_control = access_control;
        self
    }

    /// Identity presented to the service
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.config.credentials = Some(credentials);
        self
    }

    /// Secure transport context
    pub fn tls(mut self, tls: TlsContext) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Backoff policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Lower the payload ceiling below the backend's
    pub fn max_payload_bytes(mut self, limit: usize) -> Self {
        self.config.max_payload_bytes = Some(limit);
        self
    }

    /// Finish building
    pub fn build(self) -> ProviderConfig {
        self.config
    }
}

// ============================================================================
// TOML file format
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    identifier: Option<String>,
    connect_string: String,
    session_timeout: Option<String>,
    connection_timeout: Option<String>,
    root_node: Option<String>,
    access_control: Option<String>,
    max_payload_bytes: Option<usize>,
    credentials: Option<CredentialsFile>,
    retry: Option<RetryFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialsFile {
    #[serde(default = "default_scheme")]
    scheme: String,
    principal: String,
    secret: String,
}

fn default_scheme() -> String {
    "digest".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryFile {
    max_attempts: Option<u32>,
    base_delay: Option<String>,
    max_delay: Option<String>,
    multiplier: Option<f64>,
}

impl ConfigFile {
    fn into_config(self) -> ConfigResult<ProviderConfig> {
        let mut builder = ProviderConfig::builder(self.connect_string);
        if let Some(identifier) = self.identifier {
            builder = builder.identifier(identifier);
        }
        if let Some(v) = self.session_timeout {
            builder = builder.session_timeout(parse_duration(&v)?);
        }
        if let Some(v) = self.connection_timeout {
            builder = builder.connection_timeout(parse_duration(&v)?);
        }
        if let Some(v) = self.root_node {
            builder = builder.root_node(v);
        }
        if let Some(v) = self.access_control {
            builder = builder.access_control(v.parse()?);
        }
        if let Some(limit) = self.max_payload_bytes {
            builder = builder.max_payload_bytes(limit);
        }
        if let Some(c) = self.credentials {
            builder = builder.credentials(Credentials::new(c.scheme, c.principal, c.secret));
        }
        if let Some(r) = self.retry {
            let mut retry = RetryPolicy::default();
            if let Some(n) = r.max_attempts {
                retry.max_attempts = n;
            }
            if let Some(v) = r.base_delay {
                retry.base_delay = parse_duration(&v)?;
            }
            if let Some(v) = r.max_delay {
                retry.max_delay = parse_duration(&v)?;
            }
            if let Some(m) = r.multiplier {
                retry.multiplier = m;
            }
            builder = builder.retry(retry);
        }
        Ok(builder.build())
    }
}

/// Payload ceiling to enforce given the backend's limit and a config override
pub fn effective_payload_limit(backend_limit: Option<usize>, configured: Option<usize>) -> usize {
    let backend = backend_limit.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES);
    match configured {
        Some(limit) => limit.min(backend),
        None => backend,
    }
}
