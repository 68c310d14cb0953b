//! Client for an HTTP service registry.
//!
//! A [`Registrar`] announces one service instance to the registry, keeps its
//! lease alive with heartbeats paced by the server-issued TTL, and removes it
//! again on [`Registrar::deregister`]. A [`Resolver`] looks up peers of a
//! service and picks one at random.
//!
//! ```rust,ignore
//! use registrar::{ClientConfig, Registrar, RegisterOptions, ResolveOptions};
//!
//! let mut registrar = Registrar::new(ClientConfig::new("http://registry:3030"))?;
//! registrar.register(RegisterOptions::new("billing", 8000)).await?;
//!
//! let peer = registrar.resolve("ledger", ResolveOptions::ipv4()).await?;
//!
//! registrar.deregister().await?;
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod lease;
pub mod resolver;
pub mod transport;

pub use common::{InstanceRecord, RegisterRequest, RegisterResponse};
pub use config::ClientConfig;
pub use endpoint::{AddressFamily, HostProbe, PublicEndpoints, SystemHost};
pub use error::{RegistrarError, Result, TransportError};
pub use lease::{LeaseState, RegisterOptions, Registrar, ServiceRegistration};
pub use resolver::{ResolveOptions, Resolver};
pub use transport::{HttpTransport, RegistryTransport};
