// src/config.rs

use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::bulk::BulkStrategy;
use crate::commands::{PayrollService, ServiceSettings, DEFAULT_PAGE_SIZE};
use crate::gateway::{
    FileCredentialStore, GatewayError, HttpGateway, DEFAULT_API_BASE_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOKEN_FILE,
};
use crate::staleness::StalenessCache;
use crate::store::Store;

pub const ENV_PREFIX: &str = "PAYROLL_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment configuration: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Settings read from `PAYROLL_*` environment variables (and `.env`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PayrollConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_overview_max_age_minutes")]
    pub overview_max_age_minutes: i64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub bulk_strategy: BulkStrategy,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_file() -> PathBuf {
    PathBuf::from(DEFAULT_TOKEN_FILE)
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_overview_max_age_minutes() -> i64 {
    5
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl Default for PayrollConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_file: default_token_file(),
            request_timeout_secs: default_request_timeout_secs(),
            default_page_size: default_page_size(),
            overview_max_age_minutes: default_overview_max_age_minutes(),
            refresh_interval_secs: default_refresh_interval_secs(),
            bulk_strategy: BulkStrategy::default(),
        }
    }
}

/// Everything a front end needs: the command layer plus the gateway for
/// session-expiry subscriptions.
pub struct PayrollClient {
    pub service: Arc<PayrollService>,
    pub gateway: HttpGateway,
    pub credentials: Arc<FileCredentialStore>,
}

impl PayrollConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let config = envy::prefixed(ENV_PREFIX).from_env::<PayrollConfig>()?;
        config.validate()
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config = envy::prefixed(ENV_PREFIX).from_iter::<_, PayrollConfig>(pairs)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                field: "DEFAULT_PAGE_SIZE",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.overview_max_age_minutes < 0 {
            return Err(ConfigError::Invalid {
                field: "OVERVIEW_MAX_AGE_MINUTES",
                reason: "must not be negative".to_string(),
            });
        }
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "REFRESH_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            default_page_size: self.default_page_size,
            bulk_strategy: self.bulk_strategy,
        }
    }

    pub fn connect(&self) -> Result<PayrollClient, ConfigError> {
        let credentials = Arc::new(FileCredentialStore::open(&self.token_file)?);
        let gateway = HttpGateway::new(
            &self.api_base_url,
            self.request_timeout(),
            credentials.clone(),
        )?;
        let service = PayrollService::new(
            Arc::new(gateway.clone()),
            Store::new(),
            Arc::new(StalenessCache::default()),
            self.service_settings(),
        );
        info!("Payroll client configured for {}", self.api_base_url);
        Ok(PayrollClient {
            service: Arc::new(service),
            gateway,
            credentials,
        })
    }
}
