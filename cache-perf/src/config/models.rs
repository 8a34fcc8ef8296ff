use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::cache::StoreConfig;
use crate::client::SerializationFormat;

#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    #[garde(dive)]
    #[serde(default)]
    pub store: StoreSettings,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,

    #[garde(dive)]
    #[serde(default)]
    pub report: ReportConfig,

    #[garde(skip)]
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct BenchmarkConfig {
    #[garde(range(min = 1))]
    #[serde(default = "default_tenant_count")]
    pub tenant_count: usize,

    // Zero is accepted here; statistics reject it when the run is reported
    #[garde(skip)]
    #[serde(default = "default_token_count")]
    pub token_count: usize,

    #[garde(length(min = 1))]
    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[garde(custom(validate_authority_host))]
    #[serde(default = "default_authority_host")]
    pub authority_host: String,

    #[garde(skip)]
    #[serde(default)]
    pub serialization: SerializationFormat,
}

fn default_tenant_count() -> usize {
    100
}

fn default_token_count() -> usize {
    400
}

fn default_client_id() -> String {
    "fake_client_id".to_string()
}

fn default_authority_host() -> String {
    "https://fake_authority".to_string()
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            tenant_count: default_tenant_count(),
            token_count: default_token_count(),
            client_id: default_client_id(),
            authority_host: default_authority_host(),
            serialization: SerializationFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct StoreSettings {
    /// Retention in seconds for exported partitions; 0 keeps them until overwritten
    #[garde(skip)]
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,

    #[garde(range(min = 1))]
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

// Partitions outlive the run unless a retention is configured
fn default_ttl_secs() -> u64 {
    0
}

fn default_cleanup_interval_secs() -> u64 {
    600
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl From<&StoreSettings> for StoreConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            default_ttl: (settings.default_ttl_secs > 0).then(|| Duration::from_secs(settings.default_ttl_secs)),
            cleanup_interval: Duration::from_secs(settings.cleanup_interval_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String,  // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct ReportConfig {
    #[garde(pattern(r"^(text|json)$"))]
    #[serde(default = "default_report_format")]
    pub format: String,
}

fn default_report_format() -> String {
    "text".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: default_report_format(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Ci,
    Production,
}

fn validate_authority_host(value: &str, _: &()) -> garde::Result {
    let host = value
        .strip_prefix("https://")
        .ok_or_else(|| garde::Error::new("Authority host must be an https:// URL"))?;
    if host.is_empty() || host.contains('/') {
        return Err(garde::Error::new("Authority host must not contain a path"));
    }
    Ok(())
}
