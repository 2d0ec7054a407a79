//! HTTP client for the Ticker service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use ticker_core::{
    FieldSchema, GenerateRequest, HistoryRecord, HistoryRemote, PreviewImage, RenderClient,
    TemplateDescriptor, TickerError, TickerResult, UserIdentity,
};

use crate::types::{
    AckResponse, BatchDeleteRequest, BatchGenerateRequest, BatchGenerateResponse,
    GenerateResponse, HealthStatus, HistoryItem, HistoryResponse, HistoryUploadRequest,
    StylesResponse, TemplateFieldsResponse, TemplateResponse, UserProfile, UserResponse,
};

/// Errors from the Ticker service client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured base URL or a joined endpoint is not a valid URL.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A payload could not be decoded as JSON.
    #[error("failed to decode API payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-2xx status or `success: false`.
    #[error("API rejected request (status {status}): {message}")]
    Rejected {
        /// HTTP status, or 200 for an in-envelope rejection.
        status: u16,
        /// Error message from the service, possibly empty.
        message: String,
    },

    /// A 2xx response was missing data the operation needs.
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),

    /// An image payload was not valid base64.
    #[error("invalid image payload: {0}")]
    ImageDecode(#[from] base64::DecodeError),
}

impl From<ApiError> for TickerError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Rejected { status, message } => Self::RemoteRejected { status, message },
            ApiError::Json(e) => Self::RemoteRejected {
                status: 200,
                message: format!("malformed response: {e}"),
            },
            ApiError::UnexpectedResponse(message) | ApiError::InvalidUrl(message) => {
                Self::RemoteRejected {
                    status: 200,
                    message,
                }
            }
            ApiError::ImageDecode(e) => Self::RemoteRejected {
                status: 200,
                message: format!("invalid image payload: {e}"),
            },
            ApiError::Http(e) => Self::Network(e.to_string()),
        }
    }
}

struct InnerClient {
    http: reqwest::Client,
    base: Url,
    request_counter: AtomicU64,
}

/// Client for the Ticker rendering and history service.
///
/// Cheap to clone; all clones share one connection pool. Every request runs
/// under the configured timeout (10 s by default).
#[derive(Clone)]
pub struct TickerApiClient {
    inner: Arc<InnerClient>,
}

impl TickerApiClient {
    /// Client against `config.api_base_url` with `config`'s timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the base URL does not parse or the HTTP client
    /// cannot be built.
    pub fn new(config: &ticker_core::CoreConfig) -> Result<Self, ApiError> {
        let base =
            Url::parse(&config.api_base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("ticker-api/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            inner: Arc::new(InnerClient {
                http,
                base,
                request_counter: AtomicU64::new(0),
            }),
        })
    }

    /// Check service health.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a malformed response.
    pub async fn health(&self) -> Result<HealthStatus, ApiError> {
        self.get_json("/api/health").await
    }

    /// List the styles the service can render.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn styles(&self) -> Result<Vec<String>, ApiError> {
        let response: StylesResponse = self.get_json("/api/styles").await?;
        ensure_success(response.success, response.error)?;
        Ok(response.styles)
    }

    /// Fetch the template descriptor for `style`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn template(&self, style: &str) -> Result<TemplateDescriptor, ApiError> {
        let response: TemplateResponse = self.get_json(&format!("/api/template/{style}")).await?;
        ensure_success(response.success, response.error)?;
        Ok(response.fields)
    }

    /// Fetch the server-derived field list for `style`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn template_fields(&self, style: &str) -> Result<Vec<FieldSchema>, ApiError> {
        let response: TemplateFieldsResponse = self
            .get_json(&format!("/api/template/{style}/fields"))
            .await?;
        ensure_success(response.success, response.error)?;
        Ok(response.fields)
    }

    /// Render one ticket.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, service rejection, or an
    /// unusable image payload.
    pub async fn generate_ticket(&self, request: &GenerateRequest) -> Result<PreviewImage, ApiError> {
        let response: GenerateResponse = self.post_json("/api/generate", request).await?;
        ensure_success(response.success, response.error)?;
        let data = response
            .data
            .ok_or_else(|| ApiError::UnexpectedResponse("generate response missing data".into()))?;
        decode_image(&data.image_base64)
    }

    /// Render up to ten tickets in one call. Per-ticket failures come back
    /// as error strings in the corresponding slot.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or whole-batch rejection.
    pub async fn batch_generate(
        &self,
        style: &str,
        tickets: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Vec<Result<PreviewImage, String>>, ApiError> {
        let request = BatchGenerateRequest {
            style: style.to_string(),
            tickets,
            format: "base64".to_string(),
        };
        let response: BatchGenerateResponse =
            self.post_json("/api/batch_generate", &request).await?;
        ensure_success(response.success, response.error)?;
        Ok(response
            .results
            .into_iter()
            .map(|result| {
                if result.success {
                    match result.data {
                        Some(data) => decode_image(&data.image_base64)
                            .map_err(|e| e.to_string()),
                        None => Err("result missing data".to_string()),
                    }
                } else {
                    Err(result.error.unwrap_or_else(|| "generation failed".to_string()))
                }
            })
            .collect())
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn register_user(&self, profile: &UserProfile) -> Result<UserIdentity, ApiError> {
        self.user_call("/api/user/register", profile).await
    }

    /// Log an existing user in.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn login_user(&self, profile: &UserProfile) -> Result<UserIdentity, ApiError> {
        self.user_call("/api/user/login", profile).await
    }

    /// Upload history records for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn upload_history(
        &self,
        user_id: &str,
        records: &[HistoryRecord],
    ) -> Result<(), ApiError> {
        let request = HistoryUploadRequest {
            user_id: user_id.to_string(),
            history: records.iter().map(HistoryItem::from).collect(),
        };
        let response: AckResponse = self.post_json("/api/history/upload", &request).await?;
        ensure_success(response.success, response.error)
    }

    /// Fetch all history records stored for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn get_history(&self, user_id: &str) -> Result<Vec<HistoryRecord>, ApiError> {
        let response: HistoryResponse =
            self.get_json(&format!("/api/history/{user_id}")).await?;
        ensure_success(response.success, response.error)?;
        Ok(response
            .history
            .into_iter()
            .map(HistoryItem::into_record)
            .collect())
    }

    /// Delete one history record.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn delete_history(&self, user_id: &str, record_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/api/history/{user_id}/{record_id}"))?;
        self.trace_request("DELETE", &url);
        let response = self.inner.http.delete(url).send().await?;
        let ack: AckResponse = decode_response(response).await?;
        ensure_success(ack.success, ack.error)
    }

    /// Delete several history records in one call.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or service rejection.
    pub async fn batch_delete_history(
        &self,
        user_id: &str,
        record_ids: &[String],
    ) -> Result<(), ApiError> {
        let request = BatchDeleteRequest {
            user_id: user_id.to_string(),
            history_ids: record_ids.to_vec(),
        };
        let response: AckResponse = self.post_json("/api/history/batch_delete", &request).await?;
        ensure_success(response.success, response.error)
    }

    async fn user_call(&self, path: &str, profile: &UserProfile) -> Result<UserIdentity, ApiError> {
        let response: UserResponse = self.post_json(path, profile).await?;
        ensure_success(response.success, response.error)?;
        let user = response
            .user
            .ok_or_else(|| ApiError::UnexpectedResponse("user response missing user".into()))?;
        Ok(UserIdentity {
            user_id: user.user_id,
            nick_name: Some(profile.nick_name.clone()),
            avatar_url: Some(profile.avatar_url.clone()),
            register_time: user.register_time,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.trace_request("GET", &url);
        let response = self.inner.http.get(url).send().await?;
        decode_response(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        self.trace_request("POST", &url);
        let response = self.inner.http.post(url).json(body).send().await?;
        decode_response(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    fn trace_request(&self, method: &str, url: &Url) {
        let id = self.inner.request_counter.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(request_id = id, method, %url, "issuing API request");
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

fn ensure_success(success: bool, error: Option<String>) -> Result<(), ApiError> {
    if success {
        Ok(())
    } else {
        Err(ApiError::Rejected {
            status: 200,
            message: error.unwrap_or_else(|| "request rejected".to_string()),
        })
    }
}

fn decode_image(image_base64: &str) -> Result<PreviewImage, ApiError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(image_base64)?;
    Ok(PreviewImage {
        bytes,
        cached_path: None,
    })
}

#[async_trait]
impl RenderClient for TickerApiClient {
    async fn generate(&self, request: &GenerateRequest) -> TickerResult<PreviewImage> {
        self.generate_ticket(request).await.map_err(TickerError::from)
    }
}

#[async_trait]
impl HistoryRemote for TickerApiClient {
    async fn upload(&self, user_id: &str, records: &[HistoryRecord]) -> TickerResult<()> {
        self.upload_history(user_id, records)
            .await
            .map_err(TickerError::from)
    }

    async fn fetch(&self, user_id: &str) -> TickerResult<Vec<HistoryRecord>> {
        self.get_history(user_id).await.map_err(TickerError::from)
    }

    async fn delete(&self, user_id: &str, record_id: &str) -> TickerResult<()> {
        self.delete_history(user_id, record_id)
            .await
            .map_err(TickerError::from)
    }

    async fn batch_delete(&self, user_id: &str, record_ids: &[String]) -> TickerResult<()> {
        self.batch_delete_history(user_id, record_ids)
            .await
            .map_err(TickerError::from)
    }
}
