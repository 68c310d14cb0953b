//! Randomized resolution of peer addresses.

use common::InstanceRecord;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::endpoint::AddressFamily;
use crate::error::{RegistrarError, Result};
use crate::transport::RegistryTransport;

/// Per-call resolution settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub family: AddressFamily,
    /// Falls back to the resolver's default when unset.
    pub timeout: Option<Duration>,
}

impl ResolveOptions {
    pub fn ipv4() -> Self {
        Self::default()
    }

    pub fn ipv6() -> Self {
        Self {
            family: AddressFamily::Ipv6,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Stateless query against the registry; cheap to clone and safe to share.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn RegistryTransport>,
    default_timeout: Duration,
}

impl Resolver {
    pub fn new(transport: Arc<dyn RegistryTransport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
        }
    }

    /// Picks one registered instance of `service_name` uniformly at random and
    /// returns its address for the requested family, exactly as reported.
    pub async fn resolve(&self, service_name: &str, options: ResolveOptions) -> Result<String> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let instances = self.transport.query(service_name, timeout).await?;

        let index = match instances.len() {
            0 => return Err(RegistrarError::ServiceNotFound(service_name.to_string())),
            n => rand::rng().random_range(0..n),
        };
        debug!(
            service = service_name,
            candidates = instances.len(),
            index,
            "Selected instance"
        );

        address_for(&instances[index], options.family).ok_or_else(|| {
            RegistrarError::NoAddressForFamily {
                service: service_name.to_string(),
                family: options.family,
            }
        })
    }
}

fn address_for(instance: &InstanceRecord, family: AddressFamily) -> Option<String> {
    match family {
        AddressFamily::Ipv4 => instance.ipv4_address.clone(),
        AddressFamily::Ipv6 => instance.ipv6_address.clone(),
    }
}
