use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::client::retry::RetryPolicy;
use crate::config::Catalog;
use crate::error::{DecomError, Result};

/// Per-run parameters. Immutable once the run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Organization short name (the `<org>` in `<org>.command.verkada.com`).
    #[serde(default)]
    pub org_short_name: String,

    /// Backend shard for the internal surface. Default: `prod1`.
    #[serde(default = "default_shard")]
    pub shard: String,

    /// Public API region host prefix. Default: `api`.
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub endpoints: Endpoints,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Lifetime of the ephemeral public-API key. Default: 1 hour.
    #[serde(default = "default_key_lifetime")]
    pub key_lifetime_secs: u64,

    /// Lifetime of the short-lived token exchanged from the key. Default: 30 minutes.
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,

    /// How long an MFA challenge stays answerable locally. Default: 5 minutes.
    #[serde(default = "default_mfa_ttl")]
    pub mfa_challenge_ttl_secs: u64,

    /// Per-request network timeout. Default: 30.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Page size for paginated public listings. Default: 200.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default)]
    pub catalog: Catalog,
}

fn default_shard() -> String {
    "prod1".into()
}
fn default_region() -> String {
    "api".into()
}
fn default_key_lifetime() -> u64 {
    3600
}
fn default_token_lifetime() -> u64 {
    1800
}
fn default_mfa_ttl() -> u64 {
    300
}
fn default_request_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    200
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            org_short_name: String::new(),
            shard: default_shard(),
            region: default_region(),
            endpoints: Endpoints::default(),
            retry: RetryPolicy::default(),
            key_lifetime_secs: default_key_lifetime(),
            token_lifetime_secs: default_token_lifetime(),
            mfa_challenge_ttl_secs: default_mfa_ttl(),
            request_timeout_secs: default_request_timeout(),
            page_size: default_page_size(),
            catalog: Catalog::default(),
        }
    }
}

impl RunConfig {
    pub fn new(org_short_name: impl Into<String>) -> Self {
        Self {
            org_short_name: org_short_name.into(),
            ..Self::default()
        }
    }

    /// Load config from a YAML file. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| DecomError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Default location: `~/.config/org-decommission/config.yml`.
    pub fn default_path() -> PathBuf {
        super::dirs_global().join("config.yml")
    }

    /// Apply `ORG_SHORT_NAME`, `SHARD` and `REGION` from the environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(org) = get("ORG_SHORT_NAME") {
            self.org_short_name = org;
        }
        if let Some(shard) = get("SHARD") {
            self.shard = shard;
        }
        if let Some(region) = get("REGION") {
            self.region = region;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.org_short_name.trim().is_empty() {
            return Err(DecomError::InvalidConfig {
                reason: "organization short name is required".into(),
            });
        }
        if self.shard.trim().is_empty() {
            return Err(DecomError::InvalidConfig {
                reason: "shard is required".into(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(DecomError::InvalidConfig {
                reason: "retry.max_attempts must be at least 1".into(),
            });
        }
        if self.key_lifetime_secs == 0 {
            return Err(DecomError::InvalidConfig {
                reason: "key_lifetime_secs must be positive".into(),
            });
        }
        self.catalog.validate()
    }

    /// Base URL of one internal service, e.g. `https://vsensor.command.verkada.com`.
    pub fn internal_url(&self, service: &str, path: &str) -> String {
        let host = self.endpoints.internal_host.replace("{service}", service);
        format!(
            "{}/__v/{}/{}",
            host.trim_end_matches('/'),
            self.org_short_name,
            path.trim_start_matches('/')
        )
    }

    /// Public API URL for `path` in the configured region.
    pub fn external_url(&self, path: &str) -> String {
        let host = self.endpoints.external_host.replace("{region}", &self.region);
        format!(
            "{}/{}",
            host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Browser origin the internal surface expects.
    pub fn command_origin(&self) -> String {
        self.endpoints
            .command_origin
            .replace("{org}", &self.org_short_name)
    }
}

/// Host templates for both surfaces. `{service}`, `{region}` and `{org}` are
/// substituted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_internal_host")]
    pub internal_host: String,
    #[serde(default = "default_external_host")]
    pub external_host: String,
    #[serde(default = "default_command_origin")]
    pub command_origin: String,
}

fn default_internal_host() -> String {
    "https://{service}.command.verkada.com".into()
}
fn default_external_host() -> String {
    "https://{region}.verkada.com".into()
}
fn default_command_origin() -> String {
    "https://{org}.command.verkada.com".into()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            internal_host: default_internal_host(),
            external_host: default_external_host(),
            command_origin: default_command_origin(),
        }
    }
}

impl Endpoints {
    /// Route both surfaces to a single host (used against local mock servers).
    pub fn single_host(base: &str) -> Self {
        Self {
            internal_host: base.to_string(),
            external_host: base.to_string(),
            command_origin: base.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn internal_url_substitutes_service_and_org() {
        let config = RunConfig::new("acme");
        assert_eq!(
            config.internal_url("vsensor", "devices/list"),
            "https://vsensor.command.verkada.com/__v/acme/devices/list"
        );
        assert_eq!(
            config.external_url("/cameras/v1/devices"),
            "https://api.verkada.com/cameras/v1/devices"
        );
        assert_eq!(config.command_origin(), "https://acme.command.verkada.com");
    }

    #[test]
    fn single_host_endpoints_ignore_service() {
        let mut config = RunConfig::new("acme");
        config.endpoints = Endpoints::single_host("http://127.0.0.1:9999/");
        assert_eq!(
            config.internal_url("vsensor", "devices/list"),
            "http://127.0.0.1:9999/__v/acme/devices/list"
        );
        assert_eq!(config.external_url("token"), "http://127.0.0.1:9999/token");
    }

    #[test]
    fn overrides_replace_non_empty_values_only() {
        let env: HashMap<&str, &str> = [("ORG_SHORT_NAME", "acme"), ("SHARD", " ")]
            .into_iter()
            .collect();
        let mut config = RunConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.org_short_name, "acme");
        assert_eq!(config.shard, "prod1");
        assert_eq!(config.region, "api");
    }

    #[test]
    fn validate_requires_org() {
        assert!(RunConfig::default().validate().is_err());
        RunConfig::new("acme").validate().unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = RunConfig::load_from(Path::new("/nonexistent/config.yml")).unwrap();
        assert_eq!(config.key_lifetime_secs, 3600);
        assert_eq!(config.retry.max_attempts, 3);
    }
}
