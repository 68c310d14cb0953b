//! Lease lifecycle: registration, heartbeat renewal and deregistration.
//!
//! A [`Registrar`] moves through `Unregistered -> Active -> Deregistered`.
//! Once active, a background task renews the lease every half TTL until the
//! registrar is deregistered or dropped.

use common::RegisterRequest;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::endpoint::{format_address, normalize_protocol, HostProbe, SystemHost};
use crate::error::{RegistrarError, Result, TransportError};
use crate::resolver::{ResolveOptions, Resolver};
use crate::transport::{HttpTransport, RegistryTransport};

/// Where a registration sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Unregistered,
    Active,
    /// Terminal.
    Deregistered,
}

/// Everything the client knows about its own registration.
#[derive(Debug, Clone)]
pub struct ServiceRegistration {
    pub identifier: String,
    pub service_name: Option<String>,
    pub port: Option<u16>,
    pub protocol: String,
    pub ipv4_address: Option<String>,
    pub ipv6_address: Option<String>,
    pub machine_id: Option<String>,
    pub available_memory: u64,
    /// Server-issued lease duration; set once the registry accepts us.
    pub ttl: Option<Duration>,
    pub state: LeaseState,
}

impl ServiceRegistration {
    fn from_config(config: &ClientConfig) -> Self {
        Self {
            identifier: config
                .identifier
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            service_name: config.service_name.clone(),
            port: config.port,
            protocol: normalize_protocol(&config.protocol),
            ipv4_address: None,
            ipv6_address: None,
            machine_id: None,
            available_memory: 0,
            ttl: None,
            state: LeaseState::Unregistered,
        }
    }
}

/// Call-time registration parameters. Set fields override the client config.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    pub service_name: Option<String>,
    pub port: Option<u16>,
    pub identifier: Option<String>,
    pub protocol: Option<String>,
}

impl RegisterOptions {
    pub fn new(service_name: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: Some(service_name.into()),
            port: Some(port),
            ..Self::default()
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

struct Heartbeat {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Registers one service instance and keeps its lease alive.
pub struct Registrar {
    transport: Arc<dyn RegistryTransport>,
    host: Arc<dyn HostProbe>,
    resolve_timeout: Duration,
    registration: ServiceRegistration,
    heartbeat: Option<Heartbeat>,
    /// Set between leaving `Active` and the registry confirming the DELETE.
    removal_pending: bool,
}

impl Registrar {
    /// Client over HTTP against `config.registry_url`, probing the local system.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(SystemHost),
        ))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn RegistryTransport>,
        host: Arc<dyn HostProbe>,
    ) -> Self {
        Self {
            registration: ServiceRegistration::from_config(&config),
            resolve_timeout: config.resolve_timeout,
            transport,
            host,
            heartbeat: None,
            removal_pending: false,
        }
    }

    pub fn state(&self) -> LeaseState {
        self.registration.state
    }

    pub fn identifier(&self) -> &str {
        &self.registration.identifier
    }

    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// Lease duration in milliseconds; only meaningful while active.
    pub fn ttl_millis(&self) -> Option<u64> {
        match self.registration.state {
            LeaseState::Active => self
                .registration
                .ttl
                .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
            _ => None,
        }
    }

    /// Changes the advertised port. Ignored once registration has happened.
    pub fn set_port(&mut self, port: u16) {
        if self.registration.state == LeaseState::Unregistered {
            self.registration.port = Some(port);
        } else {
            debug!(
                port,
                state = ?self.registration.state,
                "Ignoring port change after registration"
            );
        }
    }

    /// Resolver sharing this client's transport.
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.transport.clone(), self.resolve_timeout)
    }

    /// Shorthand for `self.resolver().resolve(..)`.
    pub async fn resolve(&self, service_name: &str, options: ResolveOptions) -> Result<String> {
        self.resolver().resolve(service_name, options).await
    }

    /// Registers with the registry and starts renewing the lease in the
    /// background. Returns as soon as the registry has accepted the instance.
    pub async fn register(&mut self, options: RegisterOptions) -> Result<()> {
        match self.registration.state {
            LeaseState::Deregistered => return Err(RegistrarError::AlreadyDeregistered),
            LeaseState::Active => return Err(RegistrarError::AlreadyRegistered),
            LeaseState::Unregistered => {}
        }

        let service_name = options
            .service_name
            .or_else(|| self.registration.service_name.clone())
            .filter(|name| !name.is_empty())
            .ok_or(RegistrarError::InvalidArgument("serviceName"))?;
        let port = options
            .port
            .or(self.registration.port)
            .filter(|port| *port > 0)
            .ok_or(RegistrarError::InvalidArgument("port"))?;
        let identifier = options
            .identifier
            .unwrap_or_else(|| self.registration.identifier.clone());
        let protocol = options
            .protocol
            .map(|p| normalize_protocol(&p))
            .unwrap_or_else(|| self.registration.protocol.clone());

        let endpoints = self.host.public_endpoints();
        let ipv4_address = endpoints
            .ipv4
            .map(|ip| format_address(&protocol, IpAddr::V4(ip), port));
        let ipv6_address = endpoints
            .ipv6
            .map(|ip| format_address(&protocol, IpAddr::V6(ip), port));
        let machine_id = self.host.machine_id();
        let available_memory = self.host.available_memory();

        let payload = RegisterRequest {
            identifier: identifier.clone(),
            service_type: service_name.clone(),
            ipv4_address: ipv4_address.clone(),
            ipv6_address: ipv6_address.clone(),
            machine_id: machine_id.clone(),
            available_memory,
        };
        let response = self.transport.create(&payload).await?;
        if response.ttl == 0 {
            return Err(TransportError::Decode("registry returned a zero ttl".to_string()).into());
        }
        let ttl = Duration::from_secs(response.ttl);

        self.registration = ServiceRegistration {
            identifier,
            service_name: Some(service_name),
            port: Some(port),
            protocol,
            ipv4_address,
            ipv6_address,
            machine_id: Some(machine_id),
            available_memory,
            ttl: Some(ttl),
            state: LeaseState::Active,
        };
        info!(
            identifier = %self.registration.identifier,
            service = ?self.registration.service_name,
            ttl_secs = response.ttl,
            "Registered service instance"
        );

        self.heartbeat = Some(spawn_heartbeat(
            self.transport.clone(),
            self.registration.identifier.clone(),
            ttl / 2,
        ));
        Ok(())
    }

    /// Stops renewal and removes the instance from the registry.
    ///
    /// A renewal that is already in flight is allowed to finish before the
    /// removal is sent. The client is `Deregistered` from the first call on,
    /// but until the registry confirms the removal each further call re-sends
    /// it. Once confirmed, repeated calls succeed without contacting the
    /// registry.
    pub async fn deregister(&mut self) -> Result<()> {
        match self.registration.state {
            LeaseState::Deregistered if !self.removal_pending => return Ok(()),
            LeaseState::Deregistered => {}
            LeaseState::Active => {
                self.registration.state = LeaseState::Deregistered;
                self.removal_pending = true;
            }
            LeaseState::Unregistered => {
                self.registration.state = LeaseState::Deregistered;
                debug!(
                    identifier = %self.registration.identifier,
                    "Deregistered before registration"
                );
                return Ok(());
            }
        }

        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.cancel.cancel();
            if let Err(e) = heartbeat.task.await {
                warn!(error = %e, "Heartbeat task ended abnormally");
            }
        }

        self.transport.remove(&self.registration.identifier).await?;
        self.removal_pending = false;
        info!(identifier = %self.registration.identifier, "Deregistered service instance");
        Ok(())
    }
}

impl Drop for Registrar {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.cancel.cancel();
        }
    }
}

/// Renews `identifier` every `interval` until `cancel` fires.
///
/// Each cycle sleeps, re-checks cancellation, then sends exactly one renewal
/// and waits for it before sleeping again. Failed renewals are logged and the
/// loop carries on: a later renewal can still land before the lease expires.
fn spawn_heartbeat(
    transport: Arc<dyn RegistryTransport>,
    identifier: String,
    interval: Duration,
) -> Heartbeat {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let task = tokio::spawn(async move {
        let mut consecutive_failures = 0u32;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
            if token.is_cancelled() {
                break;
            }

            match transport.renew(&identifier).await {
                Ok(()) => {
                    consecutive_failures = 0;
                    debug!(identifier = %identifier, "Heartbeat sent");
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        identifier = %identifier,
                        error = %e,
                        consecutive_failures,
                        "Heartbeat failed"
                    );
                }
            }
        }
        debug!(identifier = %identifier, "Heartbeat stopped");
    });

    Heartbeat { cancel, task }
}
