use serde::{Deserialize, Serialize};

/// Body of `POST /service-instance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub identifier: String,
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "ipv4address")]
    pub ipv4_address: Option<String>,
    #[serde(rename = "ipv6address")]
    pub ipv6_address: Option<String>,
    #[serde(rename = "machineId")]
    pub machine_id: String,
    #[serde(rename = "availableMemory")]
    pub available_memory: u64,
}

/// Reply to a successful registration. `ttl` is in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub ttl: u64,
}

/// One entry of the `GET /service-instance?serviceType=...` reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(rename = "ipv4address", default)]
    pub ipv4_address: Option<String>,
    #[serde(rename = "ipv6address", default)]
    pub ipv6_address: Option<String>,
}

impl InstanceRecord {
    pub fn ipv4(address: impl Into<String>) -> Self {
        Self {
            ipv4_address: Some(address.into()),
            ipv6_address: None,
        }
    }

    pub fn ipv6(address: impl Into<String>) -> Self {
        Self {
            ipv4_address: None,
            ipv6_address: Some(address.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_uses_registry_field_names() {
        let req = RegisterRequest {
            identifier: "abc".to_string(),
            service_type: "billing".to_string(),
            ipv4_address: Some("http://10.0.0.1:8000".to_string()),
            ipv6_address: None,
            machine_id: "host-1".to_string(),
            available_memory: 2048,
        };

        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["identifier"], "abc");
        assert_eq!(value["serviceType"], "billing");
        assert_eq!(value["ipv4address"], "http://10.0.0.1:8000");
        assert!(value["ipv6address"].is_null());
        assert_eq!(value["machineId"], "host-1");
        assert_eq!(value["availableMemory"], 2048);
    }

    #[test]
    fn instance_record_tolerates_missing_families() {
        let records: Vec<InstanceRecord> =
            serde_json::from_str(r#"[{"ipv4address":"http://10.0.0.1:8000"},{}]"#).unwrap();

        assert_eq!(records[0], InstanceRecord::ipv4("http://10.0.0.1:8000"));
        assert_eq!(records[1], InstanceRecord::default());
    }
}
