// src/gateway.rs

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TOKEN_FILE: &str = "payroll_token.json";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// --- Gateway Error Type ---

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON processing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("File I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    #[error("Session expired (Status 401)")]
    Unauthorized,

    #[error("Rate limit exceeded (Status 429)")]
    RateLimitExceeded,

    #[error("Request failed with status code {}", .status.as_u16())]
    Api {
        status: StatusCode,
        message: Option<String>,
        validation_errors: Vec<String>,
        body: String,
    },

    #[error("Unexpected response envelope: {0}")]
    Envelope(String),
}

fn io_context<S: Into<String>>(source: std::io::Error, context: S) -> GatewayError {
    GatewayError::Io {
        source,
        context: context.into(),
    }
}

// --- Requests ---

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub context: &'static str,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, context: &'static str) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            context,
        }
    }

    pub fn get(path: impl Into<String>, context: &'static str) -> Self {
        Self::new(Method::GET, path, context)
    }

    pub fn post(path: impl Into<String>, context: &'static str) -> Self {
        Self::new(Method::POST, path, context)
    }

    pub fn put(path: impl Into<String>, context: &'static str) -> Self {
        Self::new(Method::PUT, path, context)
    }

    pub fn delete(path: impl Into<String>, context: &'static str) -> Self {
        Self::new(Method::DELETE, path, context)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, GatewayError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport seam every command goes through. Responses come back as raw
/// JSON; shaping them is the envelope adapter's job.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<Value, GatewayError>;
}

// --- Session Events ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server answered 401; the credential store has been cleared.
    Expired,
}

// --- Credential Store ---

pub trait CredentialStore: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
    fn clear(&self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredTokenData {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token persisted as JSON on disk, removed when the session expires.
pub struct FileCredentialStore {
    path: PathBuf,
    token: RwLock<Option<StoredTokenData>>,
}

impl FileCredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let path = path.into();
        let token = Self::load_token_data(&path)?;
        if token.is_none() {
            info!("No stored token found in {}", path.display());
        }
        Ok(Self {
            path,
            token: RwLock::new(token),
        })
    }

    pub fn load_token_data(path: &Path) -> Result<Option<StoredTokenData>, GatewayError> {
        if !path.exists() {
            return Ok(None);
        }
        let json_string = fs::read_to_string(path)
            .map_err(|e| io_context(e, format!("Failed to read token file: {:?}", path)))?;
        let stored: StoredTokenData = serde_json::from_str(&json_string)?;
        Ok(Some(stored))
    }

    pub fn save(&self, token: StoredTokenData) -> Result<(), GatewayError> {
        let json_string = serde_json::to_string_pretty(&token)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(e, format!("Failed to create directory for token file: {:?}", parent))
            })?;
        }
        let mut file = File::create(&self.path).map_err(|e| {
            io_context(e, format!("Failed to create token file: {:?}", self.path))
        })?;
        file.write_all(json_string.as_bytes()).map_err(|e| {
            io_context(e, format!("Failed to write token file: {:?}", self.path))
        })?;

        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        if self.path.exists() {
            if let Err(remove_err) = fs::remove_file(&self.path) {
                warn!(
                    "Failed to remove token file {:?}: {}",
                    self.path, remove_err
                );
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl InMemoryCredentialStore {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// --- Error Body Parsing ---

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default, alias = "Message")]
    message: Option<String>,
    #[serde(default, rename = "validationErrors", alias = "ValidationErrors", alias = "errors")]
    validation_errors: Option<Value>,
}

fn collect_messages(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Array(values) => values.iter().for_each(|v| collect_messages(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_messages(v, out)),
        _ => {}
    }
}

pub(crate) fn parse_error_body(status: StatusCode, body: String) -> GatewayError {
    let payload = serde_json::from_str::<ErrorPayload>(&body).unwrap_or_default();
    let mut validation_errors = Vec::new();
    if let Some(errors) = &payload.validation_errors {
        collect_messages(errors, &mut validation_errors);
    }
    GatewayError::Api {
        status,
        message: payload.message.filter(|m| !m.trim().is_empty()),
        validation_errors,
        body,
    }
}

// --- HTTP Gateway ---

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    http_client: Client,
    credentials: Arc<dyn CredentialStore>,
    session_events: broadcast::Sender<SessionEvent>,
}

impl HttpGateway {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, GatewayError> {
        Url::parse(base_url)?;
        let http_client = Client::builder().timeout(timeout).build()?;
        let (session_events, _) = broadcast::channel(16);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
            credentials,
            session_events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_events.subscribe()
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, GatewayError> {
        let url = if path.starts_with("http") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Ok(Url::parse(&url)?)
    }

    fn expire_session(&self) {
        warn!("Server rejected credentials; clearing session");
        self.credentials.clear();
        // No receivers simply means nobody is listening for expiry.
        let _ = self.session_events.send(SessionEvent::Expired);
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn execute(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let url = self.endpoint_url(&request.path)?;
        let mut builder = self
            .http_client
            .request(request.method.clone(), url.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.credentials.bearer_token() {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            "Sending {} for '{}' to URL: {}",
            request.method, request.context, url
        );

        let response = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "HTTP execution failed before receiving response for '{}' (URL: {}): {}",
                    request.context, url, e
                );
                return Err(GatewayError::Request(e));
            }
        };

        let status = response.status();
        debug!(
            "Received response for '{}' (URL: {}): Status={}",
            request.context, url, status
        );

        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(Value::Null);
            }
            return serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                error!(
                    "JSON deserialization failed for '{}' (URL: {}): {}",
                    request.context, url, e
                );
                GatewayError::Json(e)
            });
        }

        let error_body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("Failed to read error body: {}", e));

        match status {
            StatusCode::UNAUTHORIZED => {
                self.expire_session();
                Err(GatewayError::Unauthorized)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limit exceeded for '{}' (URL: {})", request.context, url);
                Err(GatewayError::RateLimitExceeded)
            }
            _ => {
                error!(
                    "API Error Response: Status={}, Body='{}' for URL: {}",
                    status, error_body, url
                );
                Err(parse_error_body(status, error_body))
            }
        }
    }
}
