// # OPNsense DNS Provider
//
// This crate provides an OPNsense DNS provider for the local DNS system.
// It manages host entries of either DNS service OPNsense ships:
//
// - **Unbound**: host overrides (`/api/unbound/settings/*HostOverride`)
// - **Dnsmasq**: hosts (`/api/dnsmasq/settings/*Host`)
//
// Every successful write is followed by a service reconfigure so the change
// is served immediately.
//
// ## Security Requirements
//
// - API key and secret NEVER appear in logs or Debug output
// - Invalid TLS certificates are only accepted with `insecure` set
//
// ## API Reference
//
// - Search: GET `/api/{service}/settings/searchHostOverride?searchPhrase=...`
// - Create: POST `/api/{service}/settings/addHostOverride`
// - Update: POST `/api/{service}/settings/setHostOverride/:uuid`
// - Apply: POST `/api/{service}/service/reconfigure`
//
// (Dnsmasq uses `searchHost`, `addHost` and `setHost`.)

use async_trait::async_trait;
use local_dns_core::config::{ProviderConfig, ProviderKind};
use local_dns_core::traits::{DnsProvider, DnsProviderFactory, Record};
use local_dns_core::{Error, ProviderFactories, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Description attached to entries this provider creates
const ENTRY_DESCRIPTION: &str = "managed by local-dns";

const PROVIDER_NAME: &str = "opnsense";

/// DNS service on the firewall whose host entries are managed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsService {
    /// Unbound host overrides (default)
    Unbound,
    /// Dnsmasq hosts
    Dnsmasq,
}

impl DnsService {
    /// Parse the configured service name; empty selects Unbound
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "" | "unbound" => Ok(DnsService::Unbound),
            "dnsmasq" => Ok(DnsService::Dnsmasq),
            other => Err(Error::config(format!(
                "unsupported dns_service '{}'. Supported: unbound, dnsmasq",
                other
            ))),
        }
    }

    /// Service name as used in API paths
    pub fn as_str(&self) -> &'static str {
        match self {
            DnsService::Unbound => "unbound",
            DnsService::Dnsmasq => "dnsmasq",
        }
    }

    fn search_path(&self) -> &'static str {
        match self {
            DnsService::Unbound => "/api/unbound/settings/searchHostOverride",
            DnsService::Dnsmasq => "/api/dnsmasq/settings/searchHost",
        }
    }

    fn add_path(&self) -> &'static str {
        match self {
            DnsService::Unbound => "/api/unbound/settings/addHostOverride",
            DnsService::Dnsmasq => "/api/dnsmasq/settings/addHost",
        }
    }

    fn set_path(&self, uuid: &str) -> String {
        match self {
            DnsService::Unbound => format!("/api/unbound/settings/setHostOverride/{}", uuid),
            DnsService::Dnsmasq => format!("/api/dnsmasq/settings/setHost/{}", uuid),
        }
    }

    fn reconfigure_path(&self) -> String {
        format!("/api/{}/service/reconfigure", self.as_str())
    }

    /// Request body for an add/set call
    fn entry_payload(&self, host: &str, domain: &str, ip: IpAddr) -> Value {
        match self {
            DnsService::Unbound => json!({
                "host": {
                    "enabled": "1",
                    "hostname": host,
                    "domain": domain,
                    "rr": if ip.is_ipv4() { "A" } else { "AAAA" },
                    "server": ip.to_string(),
                    "description": ENTRY_DESCRIPTION,
                }
            }),
            DnsService::Dnsmasq => json!({
                "host": {
                    "host": host,
                    "domain": domain,
                    "ip": ip.to_string(),
                }
            }),
        }
    }
}

/// A host entry as returned by a search call
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostEntry {
    uuid: String,
    address: String,
    enabled: bool,
    /// AAAA entry rather than A
    ipv6: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    rows: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    validations: Option<Value>,
}

/// OPNsense DNS provider
///
/// Holds only an HTTP client and connection settings, so one instance can be
/// shared by any number of concurrent reconciliations.
pub struct OpnsenseProvider {
    /// Base URL of the firewall API (no trailing slash)
    base_url: String,

    /// API key (basic auth user)
    /// ⚠️ NEVER log this value
    api_key: String,

    /// API secret (basic auth password)
    /// ⚠️ NEVER log this value
    api_secret: String,

    /// Managed DNS service
    service: DnsService,

    /// Whether invalid TLS certificates are accepted
    insecure: bool,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API credentials
impl std::fmt::Debug for OpnsenseProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpnsenseProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .field("api_secret", &"<REDACTED>")
            .field("service", &self.service)
            .field("insecure", &self.insecure)
            .finish()
    }
}

impl OpnsenseProvider {
    /// Create a new OPNsense provider
    ///
    /// # Parameters
    ///
    /// - `hostname`: Firewall host (`fw.lan`) or full base URL (`https://fw.lan:8443`)
    /// - `api_key` / `api_secret`: API credentials of an OPNsense user
    /// - `dns_service`: `unbound` (default when empty) or `dnsmasq`
    /// - `insecure`: Accept invalid TLS certificates
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty hostname or credentials,
    /// an unknown DNS service, or if the HTTP client cannot be built.
    pub fn new(
        hostname: &str,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        dns_service: &str,
        insecure: bool,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if hostname.is_empty() {
            return Err(Error::config("OPNsense hostname cannot be empty"));
        }
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(Error::config("OPNsense api_key and api_secret are required"));
        }

        let service = DnsService::parse(dns_service)?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        if insecure {
            tracing::warn!(hostname = %hostname, "TLS certificate verification disabled");
        }

        Ok(Self {
            base_url: base_url(hostname),
            api_key,
            api_secret,
            service,
            insecure,
            client,
        })
    }

    /// Create a provider from its configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            &config.hostname,
            config.api_key.clone(),
            config.api_secret.clone(),
            &config.dns_service,
            config.insecure,
        )
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Managed DNS service
    pub fn dns_service(&self) -> DnsService {
        self.service
    }

    /// Look up the entries for `host`.`domain`
    ///
    /// The search phrase matches loosely on the firewall, so rows are
    /// filtered here for an exact (case-insensitive) host and domain match.
    /// Unbound rows that are not address records (MX) are ignored. A
    /// dual-stack name yields one A and one AAAA entry.
    async fn find_entries(&self, host: &str, domain: &str) -> Result<Vec<HostEntry>> {
        let url = format!("{}{}", self.base_url, self.service.search_path());

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .query(&[("searchPhrase", host), ("rowCount", "-1")])
            .send()
            .await
            .map_err(|e| Error::query(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::query(
                PROVIDER_NAME,
                status_message(status, &error_text, "Host search failed"),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::query(PROVIDER_NAME, format!("Failed to parse response: {}", e)))?;

        Ok(body
            .rows
            .iter()
            .filter_map(|row| self.parse_row(row))
            .filter(|(row_host, row_domain, _)| {
                row_host.eq_ignore_ascii_case(host) && row_domain.eq_ignore_ascii_case(domain)
            })
            .map(|(_, _, entry)| entry)
            .collect())
    }

    /// Look up `domain` and pick one entry
    ///
    /// With a family given only an entry of that family qualifies; without
    /// one the A entry is preferred over the AAAA entry.
    async fn lookup(&self, domain: &str, ipv6: Option<bool>) -> Result<Option<HostEntry>> {
        let (host, zone) =
            split_domain(domain).map_err(|e| Error::query(PROVIDER_NAME, e.to_string()))?;

        let mut entries = self.find_entries(host, zone).await?;
        Ok(match ipv6 {
            Some(ipv6) => entries.into_iter().find(|entry| entry.ipv6 == ipv6),
            None => {
                entries.sort_by_key(|entry| entry.ipv6);
                entries.into_iter().next()
            }
        })
    }

    fn parse_row(&self, row: &Value) -> Option<(String, String, HostEntry)> {
        let field = |name: &str| row.get(name).and_then(Value::as_str);

        // Grid rows may carry the display text, e.g. "A (IPv4 address)"
        let rr = field("rr").unwrap_or("");
        let (host, address) = match self.service {
            DnsService::Unbound => {
                if !rr.is_empty() && !rr.starts_with('A') {
                    return None;
                }
                (field("hostname")?, field("server").unwrap_or(""))
            }
            DnsService::Dnsmasq => (field("host")?, field("ip").unwrap_or("")),
        };

        let ipv6 = if rr.is_empty() {
            address.parse::<IpAddr>().is_ok_and(|ip| ip.is_ipv6())
        } else {
            rr.starts_with("AAAA")
        };

        let entry = HostEntry {
            uuid: field("uuid")?.to_string(),
            address: address.to_string(),
            enabled: field("enabled").is_none_or(|enabled| enabled != "0"),
            ipv6,
        };

        Some((host.to_string(), field("domain").unwrap_or("").to_string(), entry))
    }

    /// POST a JSON body and interpret an OPNsense `{"result": ...}` reply
    async fn post_write(&self, path: &str, payload: &Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(payload)
            .send()
            .await
            .map_err(|e| Error::write(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::write(
                PROVIDER_NAME,
                status_message(status, &error_text, "Write failed"),
            ));
        }

        let body: WriteResponse = response
            .json()
            .await
            .map_err(|e| Error::write(PROVIDER_NAME, format!("Failed to parse response: {}", e)))?;

        if body.result != "saved" {
            let detail = body
                .validations
                .map(|v| v.to_string())
                .unwrap_or_else(|| format!("result: {}", body.result));
            return Err(Error::write(
                PROVIDER_NAME,
                format!("Entry rejected: {}", detail),
            ));
        }

        Ok(())
    }

    /// Apply pending changes on the firewall
    async fn reconfigure(&self) -> Result<()> {
        let url = format!("{}{}", self.base_url, self.service.reconfigure_path());

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| Error::write(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::write(
                PROVIDER_NAME,
                status_message(status, &error_text, "Reconfigure failed"),
            ));
        }

        tracing::debug!(service = self.service.as_str(), "reconfigured DNS service");
        Ok(())
    }
}

#[async_trait]
impl DnsProvider for OpnsenseProvider {
    async fn find_record(&self, domain: &str) -> Result<Option<Record>> {
        let entry = self.lookup(domain, None).await?;
        Ok(entry.map(|entry| Record::new(domain, entry.address, entry.enabled)))
    }

    async fn find_record_for(&self, domain: &str, ip: IpAddr) -> Result<Option<Record>> {
        let entry = self.lookup(domain, Some(ip.is_ipv6())).await?;
        Ok(entry.map(|entry| Record::new(domain, entry.address, entry.enabled)))
    }

    async fn create_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        let (host, zone) =
            split_domain(domain).map_err(|e| Error::write(PROVIDER_NAME, e.to_string()))?;

        tracing::info!(domain = %domain, ip = %ip, service = self.service.as_str(), "Creating OPNsense host entry");

        let payload = self.service.entry_payload(host, zone, ip);
        self.post_write(self.service.add_path(), &payload).await?;
        self.reconfigure().await
    }

    async fn update_record(&self, domain: &str, ip: IpAddr) -> Result<()> {
        let (host, zone) =
            split_domain(domain).map_err(|e| Error::write(PROVIDER_NAME, e.to_string()))?;

        let entry = self
            .lookup(domain, Some(ip.is_ipv6()))
            .await
            .map_err(|e| Error::write(PROVIDER_NAME, e.to_string()))?
            .ok_or_else(|| {
                Error::write(PROVIDER_NAME, format!("Host entry not found: {}", domain))
            })?;

        tracing::info!(
            domain = %domain,
            ip = %ip,
            previous_ip = %entry.address,
            service = self.service.as_str(),
            "Updating OPNsense host entry"
        );

        let payload = self.service.entry_payload(host, zone, ip);
        self.post_write(&self.service.set_path(&entry.uuid), &payload)
            .await?;
        self.reconfigure().await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Split `svc.example.lan` into (`svc`, `example.lan`)
fn split_domain(domain: &str) -> Result<(&str, &str)> {
    match domain.split_once('.') {
        Some((host, zone)) if !host.is_empty() && !zone.is_empty() => Ok((host, zone)),
        _ => Err(Error::invalid_input(format!(
            "domain must have a host and a domain part: {}",
            domain
        ))),
    }
}

fn base_url(hostname: &str) -> String {
    if hostname.contains("://") {
        hostname.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", hostname.trim_end_matches('/'))
    }
}

/// Map an unsuccessful HTTP status to an error message
fn status_message(status: reqwest::StatusCode, error_text: &str, context: &str) -> String {
    match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API key/secret or insufficient privileges. Status: {}",
            status
        ),
        404 => format!("Endpoint not found (is the DNS service installed?). Status: {}", status),
        429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
        500..=599 => format!("OPNsense server error (transient): {} - {}", status, error_text),
        _ => format!("{}: {} - {}", context, status, error_text),
    }
}

/// Factory for creating OPNsense providers
pub struct OpnsenseFactory;

impl DnsProviderFactory for OpnsenseFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn DnsProvider>> {
        if config.kind != ProviderKind::Opnsense {
            return Err(Error::config("Invalid config for OPNsense provider"));
        }
        Ok(Arc::new(OpnsenseProvider::from_config(config)?))
    }
}

/// Register the OPNsense provider with a factory table
///
/// # Example
///
/// ```rust
/// use local_dns_core::ProviderFactories;
/// use local_dns_core::config::ProviderKind;
///
/// let mut factories = ProviderFactories::with_builtins();
/// local_dns_provider_opnsense::register(&mut factories);
/// assert!(factories.has(ProviderKind::Opnsense));
/// ```
pub fn register(factories: &mut ProviderFactories) {
    factories.register(ProviderKind::Opnsense, Box::new(OpnsenseFactory));
}
