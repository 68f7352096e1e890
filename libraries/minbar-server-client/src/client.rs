//! Client for the host application's playback endpoints.

use crate::error::{Result, ServerClientError};
use crate::types::{PositionResponse, ServerConfig};
use async_trait::async_trait;
use minbar_core::{
    CheckpointRecord, PositionStore, ResourceRef, Result as CoreResult, StopAudioService,
};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Header carrying the anti-forgery token
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Client for the position and stop-audio endpoints.
///
/// Implements [`PositionStore`] and [`StopAudioService`] so it can be handed
/// straight to the checkpointer and the session registry.
///
/// # Example
///
/// ```ignore
/// use minbar_server_client::{MinbarClient, ServerConfig};
///
/// let config = ServerConfig::with_csrf_token("https://minbar.example.com", token);
/// let client = MinbarClient::new(config)?;
///
/// if let Some(position) = client.load_position(&ResourceRef::new("lesson", "7")).await? {
///     println!("Resume at {position}s");
/// }
/// ```
pub struct MinbarClient {
    http: Client,
    base: Url,
    csrf_token: RwLock<Option<String>>,
}

impl MinbarClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let url = config.url.trim();
        if url.is_empty() {
            return Err(ServerClientError::InvalidUrl("URL cannot be empty".into()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ServerClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        let base = Url::parse(url.trim_end_matches('/'))
            .map_err(|e| ServerClientError::InvalidUrl(format!("{url}: {e}")))?;

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(5))
            .user_agent(format!("Minbar/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            csrf_token: RwLock::new(config.csrf_token),
        })
    }

    /// The normalized base URL, without a trailing slash.
    pub fn url(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }

    /// Replace the CSRF token (host pages rotate it per session).
    pub async fn set_csrf_token(&self, token: Option<String>) {
        *self.csrf_token.write().await = token;
    }

    /// Persist a playback position.
    pub async fn save_position(&self, record: &CheckpointRecord) -> Result<()> {
        let url = self.endpoint(&["playback_positions"])?;
        debug!(
            url = %url,
            resource_type = %record.resource_type,
            resource_id = %record.resource_id,
            position = record.position,
            "Saving playback position"
        );

        let request = self.with_csrf(self.http.post(url).json(record)).await;
        let response = request.send().await.map_err(send_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_response(response).await)
        }
    }

    /// Look up the saved position of a resource.
    ///
    /// Returns `None` when the server has no record (404 or a `null` position).
    pub async fn load_position(&self, resource: &ResourceRef) -> Result<Option<f64>> {
        let url = self.endpoint(&[
            "playback_positions",
            &resource.resource_type,
            &resource.resource_id,
        ])?;
        debug!(url = %url, "Loading playback position");

        let response = self.http.get(url).send().await.map_err(send_error)?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_response(response).await);
        }

        let body: PositionResponse = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse position response: {}", e))
        })?;
        Ok(body.position.filter(|p| p.is_finite() && *p >= 0.0))
    }

    /// Tell the server to stop all audio for this session.
    ///
    /// Returns the server-rendered fragment that clears the player region, or
    /// `None` when the server answered with no content.
    pub async fn stop_audio(&self) -> Result<Option<String>> {
        let url = self.endpoint(&["stop_audio"])?;
        debug!(url = %url, "Requesting stop of all audio");

        let request = self
            .with_csrf(self.http.post(url).header(ACCEPT, "text/html"))
            .await;
        let response = request.send().await.map_err(send_error)?;
        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(error_response(response).await);
        }

        let fragment = response.text().await?;
        if fragment.trim().is_empty() {
            Ok(None)
        } else {
            info!(bytes = fragment.len(), "Server cleared the player region");
            Ok(Some(fragment))
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ServerClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn with_csrf(&self, request: RequestBuilder) -> RequestBuilder {
        match self.csrf_token.read().await.as_deref() {
            Some(token) => request.header(CSRF_HEADER, token),
            None => request,
        }
    }
}

fn send_error(e: reqwest::Error) -> ServerClientError {
    if e.is_connect() || e.is_timeout() {
        ServerClientError::ServerUnreachable(e.to_string())
    } else {
        ServerClientError::Request(e)
    }
}

async fn error_response(response: Response) -> ServerClientError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!(status = %status, "Request rejected by server");
        return ServerClientError::Unauthorized {
            status: status.as_u16(),
        };
    }
    ServerClientError::ServerError {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl PositionStore for MinbarClient {
    async fn save(&self, record: &CheckpointRecord) -> CoreResult<()> {
        Ok(self.save_position(record).await?)
    }

    async fn load(&self, resource: &ResourceRef) -> CoreResult<Option<f64>> {
        Ok(self.load_position(resource).await?)
    }
}

#[async_trait]
impl StopAudioService for MinbarClient {
    async fn clear_player(&self) -> CoreResult<Option<String>> {
        Ok(self.stop_audio().await?)
    }
}

impl std::fmt::Debug for MinbarClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinbarClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}
