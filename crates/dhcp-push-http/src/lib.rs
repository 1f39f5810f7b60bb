// # HTTP Push Transport
//
// Delivers the eligible DHCP entry set to an agent listening on each DHCP
// server.
//
// ## Wire Format
//
// `POST {scheme}://{ip}:{port}{path}` with body:
//
// ```json
// {"entries":[{"address":"10.0.0.5","hostname":"host1","mac":"aa:bb:cc:dd:ee:ff"}]}
// ```
//
// Any 2xx response is a confirmed delivery. Everything else becomes
// `Error::PushFailed` for that target.
//
// ## Constraints
//
// - One HTTP request per push; retries and scheduling belong to `SyncCoordinator`
// - No state between calls, no access to the target store
// - The bearer token never appears in logs or `Debug` output

use async_trait::async_trait;
use dhcp_core::config::TransportConfig;
use dhcp_core::model::DhcpEntry;
use dhcp_core::traits::{PushTransport, PushTransportFactory};
use dhcp_core::{Error, Result};
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default HTTP timeout for push requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body sent to the agent
#[derive(Serialize)]
struct PushRequest<'a> {
    entries: &'a [DhcpEntry],
}

/// HTTP push transport
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the transport builds the request, logs it and
/// reports success without sending anything.
pub struct HttpPushTransport {
    client: reqwest::Client,
    port: u16,
    path: String,
    /// Bearer token
    /// ⚠️ NEVER log this value
    token: Option<String>,
    use_tls: bool,
    dry_run: bool,
}

impl std::fmt::Debug for HttpPushTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPushTransport")
            .field("port", &self.port)
            .field("path", &self.path)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("use_tls", &self.use_tls)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl HttpPushTransport {
    /// Create a plain-HTTP transport with the default timeout
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `path` does not start with `/` or the HTTP
    ///   client cannot be built
    pub fn new(port: u16, path: impl Into<String>) -> Result<Self> {
        Self::with_timeout(port, path, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a plain-HTTP transport with an explicit request timeout
    pub fn with_timeout(port: u16, path: impl Into<String>, timeout: Duration) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(Error::config(format!(
                "HTTP push path must start with '/': {}",
                path
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            port,
            path,
            token: None,
            use_tls: false,
            dry_run: false,
        })
    }

    /// Build a transport from [`TransportConfig::Http`]
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        match config {
            TransportConfig::Http {
                port,
                path,
                token,
                use_tls,
                timeout_secs,
                dry_run,
            } => {
                config.validate()?;
                let mut transport =
                    Self::with_timeout(*port, path.clone(), Duration::from_secs(*timeout_secs))?
                        .with_tls(*use_tls)
                        .with_dry_run(*dry_run);
                if let Some(token) = token {
                    transport = transport.with_token(token.clone());
                }
                Ok(transport)
            }
            other => Err(Error::config(format!(
                "Invalid config for HTTP transport: {}",
                other.type_name()
            ))),
        }
    }

    /// Send `Authorization: Bearer <token>` with every push
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Use HTTPS instead of HTTP
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Log pushes instead of sending them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether pushes are only logged
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Agent URL for `target`; IPv6 addresses are bracketed
    pub fn endpoint(&self, target: IpAddr) -> String {
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{}://{}{}", scheme, SocketAddr::new(target, self.port), self.path)
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn push(&self, target: IpAddr, entries: &[DhcpEntry]) -> Result<()> {
        let url = self.endpoint(target);
        let body = PushRequest { entries };

        if self.dry_run {
            let payload = serde_json::to_string(&body)?;
            info!("[DRY-RUN] Would push {} entries to {}", entries.len(), url);
            debug!("[DRY-RUN] Payload: {}", payload);
            return Ok(());
        }

        debug!("Pushing {} entries to {}", entries.len(), url);

        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::push_failed(target, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Agent at {} accepted {} entries ({})", target, entries.len(), status);
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(Error::push_failed(target, describe_status(status, &error_text)))
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}

/// Human-readable reason for a non-2xx agent response
fn describe_status(status: reqwest::StatusCode, error_text: &str) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: invalid or missing push token. Status: {}",
            status
        ),
        404 => format!("Push endpoint not found on agent. Status: {}", status),
        409 => format!(
            "Conflict: agent is applying another update. Status: {}",
            status
        ),
        429 => format!("Agent rate limit exceeded. Status: {}", status),
        500..=599 => format!("Agent server error (transient): {} - {}", status, error_text),
        _ => format!("Push rejected: {} - {}", status, error_text),
    }
}

/// Factory for creating HTTP push transports
///
/// `DHCP_SYNC_MODE=dry-run` forces dry-run mode regardless of configuration.
pub struct HttpPushTransportFactory;

impl PushTransportFactory for HttpPushTransportFactory {
    fn create(&self, config: &TransportConfig) -> Result<Box<dyn PushTransport>> {
        let mut transport = HttpPushTransport::from_config(config)?;

        let env_dry_run = std::env::var("DHCP_SYNC_MODE")
            .unwrap_or_default()
            .eq_ignore_ascii_case("dry-run");
        if env_dry_run {
            transport = transport.with_dry_run(true);
        }

        if transport.is_dry_run() {
            warn!("HTTP push transport running in DRY-RUN mode - nothing will be sent");
        }

        Ok(Box::new(transport))
    }
}

/// Register the HTTP transport with a component registry
///
/// # Example
///
/// ```rust
/// use dhcp_core::ComponentRegistry;
///
/// let registry = ComponentRegistry::with_builtin_stores();
/// dhcp_push_http::register(&registry);
/// assert!(registry.has_transport("http"));
/// ```
pub fn register(registry: &dhcp_core::ComponentRegistry) {
    registry.register_transport("http", Box::new(HttpPushTransportFactory));
}
