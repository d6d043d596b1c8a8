//! Vault configuration
//!
//! Remote service endpoints plus the handful of values the hosting
//! application may want echoed back through the `config` operation.
//! Field names are camelCase on the wire to match the protocol boundary.

use serde::{Deserialize, Serialize};

/// Static configuration for one vault instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Remote share store ("FMS") endpoint
    pub share_store_url: String,
    /// Remote object store ("permastore") endpoint
    pub object_store_url: String,
    /// Home application a freshly enrolled device is pointed at, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_app_url: Option<String>,
}

impl VaultConfig {
    /// Config pointing both remote services at one base URL
    pub fn single_endpoint(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            share_store_url: url.clone(),
            object_store_url: url,
            home_app_url: None,
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            share_store_url: "https://fms.zippie.org".to_string(),
            object_store_url: "https://fms.zippie.org".to_string(),
            home_app_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_camel_case() {
        let config = VaultConfig::single_endpoint("https://fms.example.test");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["shareStoreUrl"], "https://fms.example.test");
        assert_eq!(json["objectStoreUrl"], "https://fms.example.test");
        assert!(json.get("homeAppUrl").is_none());
    }

    #[test]
    fn default_points_at_production() {
        let config = VaultConfig::default();
        assert!(config.share_store_url.starts_with("https://"));
    }
}
