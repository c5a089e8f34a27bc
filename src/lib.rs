// src/lib.rs
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

pub mod detail;
pub mod feature;
pub mod route;

pub use crate::detail::{CompletionOrder, FeatureDetail, Subscription, ViewState};
pub use crate::feature::Feature;
pub use crate::route::{RouteParams, FEATURE_NAME_PARAM};

use crate::feature::{CreateFeature, StatusPatch};

const BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

const ENV_URL: &str = "LAIKA_URL";
const ENV_TIMEOUT_SECS: &str = "LAIKA_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum LaikaError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    ApiError(String),

    #[error("missing route parameter: {0}")]
    MissingParam(String),

    #[error("no feature loaded")]
    NoFeatureLoaded,

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// The remote operations the feature detail view depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn get_feature(&self, name: &str) -> Result<Feature, LaikaError>;

    /// Switches `environment` of the feature called `feature_name`.
    async fn toggle_feature(
        &self,
        environment: &str,
        feature_name: &str,
        status: bool,
    ) -> Result<Feature, LaikaError>;

    async fn list_features(&self) -> Result<Vec<Feature>, LaikaError>;

    async fn create_feature(&self, name: &str) -> Result<Feature, LaikaError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct Client {
    base_url: Url,
    http_client: reqwest::Client,
    timeout: Duration,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn debug_info(&self) -> String {
        format!(
            "Client {{ base_url: {}, timeout: {:?} }}",
            self.base_url, self.timeout
        )
    }

    fn features_url(&self, name: Option<&str>) -> Result<Url, LaikaError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                LaikaError::ConfigError(format!("base URL cannot be a base: {}", self.base_url))
            })?;
            segments.pop_if_empty().extend(["api", "features"]);
            if let Some(name) = name {
                segments.push(name);
            }
        }
        Ok(url)
    }

    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("User-Agent", HeaderValue::from_static("Laika-Rust"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers
    }

    async fn decode<T: DeserializeOwned>(response: Response, name: &str) -> Result<T, LaikaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let body_message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message);
        let message = body_message
            .clone()
            .unwrap_or_else(|| format!("unexpected status code: {}", status));
        debug!("Laika API answered {} for {:?}: {}", status, name, message);

        Err(match status {
            StatusCode::NOT_FOUND => LaikaError::NotFound(
                body_message.unwrap_or_else(|| format!("feature not found: {}", name)),
            ),
            StatusCode::CONFLICT => LaikaError::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                LaikaError::Invalid(message)
            }
            _ => LaikaError::ApiError(message),
        })
    }
}

fn require_name(name: &str) -> Result<(), LaikaError> {
    if name.trim().is_empty() {
        return Err(LaikaError::Invalid("Name is required".to_string()));
    }
    Ok(())
}

#[async_trait]
impl Backend for Client {
    async fn get_feature(&self, name: &str) -> Result<Feature, LaikaError> {
        require_name(name)?;
        let response = self
            .http_client
            .get(self.features_url(Some(name))?)
            .headers(Self::headers())
            .send()
            .await?;
        Self::decode(response, name).await
    }

    async fn toggle_feature(
        &self,
        environment: &str,
        feature_name: &str,
        status: bool,
    ) -> Result<Feature, LaikaError> {
        require_name(feature_name)?;
        if environment.is_empty() {
            return Err(LaikaError::Invalid("Environment is required".to_string()));
        }
        debug!(
            "Toggling feature {:?} in {:?} to {}",
            feature_name, environment, status
        );
        // Environments missing from the body are switched off server side.
        let updated = self
            .get_feature(feature_name)
            .await?
            .with_status(environment, status);
        let response = self
            .http_client
            .patch(self.features_url(Some(feature_name))?)
            .headers(Self::headers())
            .json(&StatusPatch::of(&updated))
            .send()
            .await?;
        Self::decode(response, feature_name).await
    }

    async fn list_features(&self) -> Result<Vec<Feature>, LaikaError> {
        let response = self
            .http_client
            .get(self.features_url(None)?)
            .headers(Self::headers())
            .send()
            .await?;
        Self::decode(response, "").await
    }

    async fn create_feature(&self, name: &str) -> Result<Feature, LaikaError> {
        require_name(name)?;
        let response = self
            .http_client
            .post(self.features_url(None)?)
            .headers(Self::headers())
            .json(&CreateFeature { name })
            .send()
            .await?;
        Self::decode(response, name).await
    }
}

pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    env_errors: Vec<String>,
}

impl ClientBuilder {
    fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            env_errors: Vec::new(),
        }
    }

    /// Starts from the defaults and applies `LAIKA_URL` and `LAIKA_TIMEOUT_SECS`
    /// when they are set.
    pub fn from_env() -> Self {
        let mut builder = Self::new();

        if let Ok(url) = env::var(ENV_URL) {
            if !url.is_empty() {
                builder.base_url = url;
            }
        }

        if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => builder.timeout = Duration::from_secs(secs),
                _ => {
                    warn!("Ignoring invalid {}={:?}", ENV_TIMEOUT_SECS, raw);
                    builder
                        .env_errors
                        .push(format!("{} must be a positive integer, got {:?}", ENV_TIMEOUT_SECS, raw));
                }
            }
        }

        builder
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client, LaikaError> {
        if let Some(err) = self.env_errors.into_iter().next() {
            return Err(LaikaError::ConfigError(err));
        }

        let base_url = Url::parse(&self.base_url)
            .map_err(|e| LaikaError::ConfigError(format!("invalid base URL {:?}: {}", self.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(LaikaError::ConfigError(format!(
                "base URL cannot be a base: {}",
                self.base_url
            )));
        }

        let http_client = reqwest::Client::builder().timeout(self.timeout).build()?;

        Ok(Client {
            base_url,
            http_client,
            timeout: self.timeout,
        })
    }
}
