//! Client configuration.

use std::time::Duration;

use crate::endpoint::normalize_protocol;

pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:3030";
pub const DEFAULT_PROTOCOL: &str = "http://";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings plus optional construction-time identity.
///
/// Fields passed to [`Registrar::register`](crate::Registrar::register) through
/// [`RegisterOptions`](crate::RegisterOptions) take precedence over the
/// identity fields here.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Registry host, e.g. `http://registry:3030`. `/service-instance` is appended.
    pub registry_url: String,
    pub protocol: String,
    /// Bound on register, renew and deregister requests.
    pub request_timeout: Duration,
    /// Default bound on resolution when the caller passes none.
    pub resolve_timeout: Duration,
    pub service_name: Option<String>,
    pub port: Option<u16>,
    pub identifier: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            service_name: None,
            port: None,
            identifier: None,
        }
    }
}

impl ClientConfig {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `REGISTRAR_URL`, `REGISTRAR_PROTOCOL`,
    /// `REGISTRAR_SERVICE` and `REGISTRAR_PORT`. Unparseable ports are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("REGISTRAR_URL") {
            config.registry_url = url;
        }
        if let Some(protocol) = lookup("REGISTRAR_PROTOCOL") {
            config = config.with_protocol(protocol);
        }
        if let Some(service) = lookup("REGISTRAR_SERVICE") {
            config.service_name = Some(service);
        }
        if let Some(port) = lookup("REGISTRAR_PORT").and_then(|p| p.parse().ok()) {
            config.port = Some(port);
        }
        config
    }

    pub fn with_protocol(mut self, protocol: impl AsRef<str>) -> Self {
        self.protocol = normalize_protocol(protocol.as_ref());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.registry_url, DEFAULT_REGISTRY_URL);
        assert_eq!(config.protocol, "http://");
        assert_eq!(config.resolve_timeout, Duration::from_secs(5));
        assert!(config.service_name.is_none());
    }

    #[test]
    fn env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("REGISTRAR_URL", "http://registry:9000"),
            ("REGISTRAR_PROTOCOL", "https"),
            ("REGISTRAR_SERVICE", "billing"),
            ("REGISTRAR_PORT", "not-a-port"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.registry_url, "http://registry:9000");
        assert_eq!(config.protocol, "https://");
        assert_eq!(config.service_name.as_deref(), Some("billing"));
        assert_eq!(config.port, None);
    }
}
