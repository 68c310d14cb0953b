//! HTTP access to the registry's `/service-instance` resource.

use async_trait::async_trait;
use common::{InstanceRecord, RegisterRequest, RegisterResponse};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::TransportError;

const RESOURCE: &str = "service-instance";

/// Registry operations the lease manager and resolver depend on.
#[async_trait]
pub trait RegistryTransport: Send + Sync {
    /// `POST /service-instance`, expects 201 and a `{ttl}` body.
    async fn create(&self, payload: &RegisterRequest) -> Result<RegisterResponse, TransportError>;

    /// `PATCH /service-instance/{identifier}`, expects 200.
    async fn renew(&self, identifier: &str) -> Result<(), TransportError>;

    /// `DELETE /service-instance/{identifier}`, expects 200.
    async fn remove(&self, identifier: &str) -> Result<(), TransportError>;

    /// `GET /service-instance?serviceType={name}`, expects 200, bounded by `timeout`.
    async fn query(
        &self,
        service_name: &str,
        timeout: Duration,
    ) -> Result<Vec<InstanceRecord>, TransportError>;
}

/// [`RegistryTransport`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let base = resource_url(&config.registry_url)?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base,
            request_timeout: config.request_timeout,
        })
    }

    fn instance_url(&self, identifier: &str) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .push(identifier);
        Ok(url)
    }
}

fn resource_url(registry_url: &str) -> Result<Url, TransportError> {
    let mut base = Url::parse(registry_url)?;
    base.path_segments_mut()
        .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .push(RESOURCE);
    Ok(base)
}

fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else {
        TransportError::Network(err)
    }
}

fn expect_status(
    method: &'static str,
    response: Response,
    expected: StatusCode,
) -> Result<Response, TransportError> {
    let actual = response.status();
    if actual == expected {
        Ok(response)
    } else {
        Err(TransportError::Status {
            method,
            url: response.url().to_string(),
            expected: expected.as_u16(),
            actual: actual.as_u16(),
        })
    }
}

#[async_trait]
impl RegistryTransport for HttpTransport {
    async fn create(&self, payload: &RegisterRequest) -> Result<RegisterResponse, TransportError> {
        let timeout = self.request_timeout;
        let response = self
            .client
            .post(self.base.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let response = expect_status("POST", response, StatusCode::CREATED)?;
        let body: RegisterResponse = response.json().await.map_err(|e| classify(e, timeout))?;
        debug!(identifier = %payload.identifier, ttl = body.ttl, "Registry accepted registration");
        Ok(body)
    }

    async fn renew(&self, identifier: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .patch(self.instance_url(identifier)?)
            .send()
            .await
            .map_err(|e| classify(e, self.request_timeout))?;

        expect_status("PATCH", response, StatusCode::OK)?;
        Ok(())
    }

    async fn remove(&self, identifier: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.instance_url(identifier)?)
            .send()
            .await
            .map_err(|e| classify(e, self.request_timeout))?;

        expect_status("DELETE", response, StatusCode::OK)?;
        Ok(())
    }

    async fn query(
        &self,
        service_name: &str,
        timeout: Duration,
    ) -> Result<Vec<InstanceRecord>, TransportError> {
        let response = self
            .client
            .get(self.base.clone())
            .query(&[("serviceType", service_name)])
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let response = expect_status("GET", response, StatusCode::OK)?;
        let instances: Vec<InstanceRecord> =
            response.json().await.map_err(|e| classify(e, timeout))?;
        debug!(service = service_name, count = instances.len(), "Queried registry");
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_url_appends_collection() {
        assert_eq!(
            resource_url("http://registry:3030").unwrap().as_str(),
            "http://registry:3030/service-instance"
        );
        assert_eq!(
            resource_url("http://registry:3030/api/").unwrap().as_str(),
            "http://registry:3030/api/service-instance"
        );
    }

    #[test]
    fn instance_url_escapes_identifier() {
        let transport = HttpTransport::new(&ClientConfig::new("http://registry:3030")).unwrap();
        assert_eq!(
            transport.instance_url("a b/c").unwrap().as_str(),
            "http://registry:3030/service-instance/a%20b%2Fc"
        );
    }

    #[test]
    fn rejects_unparseable_registry_url() {
        let err = HttpTransport::new(&ClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
