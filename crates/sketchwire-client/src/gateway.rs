//! Request/response gateways: stroke cleanup and diagram persistence.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use sketchwire_core::cleanup::StrokeSet;
use sketchwire_core::diagram::{CreatedDiagram, Diagram, DiagramSummary, NewDiagram};
use sketchwire_core::Stroke;

use crate::error::{ClientError, Result};

/// Turns a stroke set into a cleaned-up stroke set.
#[async_trait]
pub trait CleanupGateway: Send + Sync {
    async fn cleanup(&self, strokes: Vec<Stroke>) -> Result<Vec<Stroke>>;
}

/// Diagram persistence as seen from the client.
#[async_trait]
pub trait DiagramGateway: Send + Sync {
    async fn create(&self, diagram: NewDiagram) -> Result<CreatedDiagram>;
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DiagramSummary>>;
    async fn list_shared(&self) -> Result<Vec<DiagramSummary>>;
    async fn fetch(&self, id: u64) -> Result<Diagram>;
}

/// Cleanup response. A body without `strokes` is not a usable result.
#[derive(Deserialize)]
struct CleanupResponse {
    strokes: Option<Vec<Stroke>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Both gateways over HTTP against the relay's API.
pub struct HttpGateway {
    pub base_url: String,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// `base_url` plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let base = &self.base_url;
        let mut url = Url::parse(base)
            .map_err(|e| ClientError::Gateway(format!("invalid api base {base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::Gateway(format!("api base cannot take a path: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.detail)
                .unwrap_or(body);
            return Err(ClientError::Gateway(format!("{status}: {detail}")));
        }
        Ok(response.json::<T>().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(%url, "GET");
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl CleanupGateway for HttpGateway {
    async fn cleanup(&self, strokes: Vec<Stroke>) -> Result<Vec<Stroke>> {
        let url = self.endpoint(&["ai", "cleanup"])?;
        let response = self
            .client
            .post(url)
            .json(&StrokeSet { strokes })
            .send()
            .await?;
        let body: CleanupResponse = Self::read_json(response).await?;
        body.strokes
            .ok_or_else(|| ClientError::Gateway("cleanup response has no strokes".into()))
    }
}

#[async_trait]
impl DiagramGateway for HttpGateway {
    async fn create(&self, diagram: NewDiagram) -> Result<CreatedDiagram> {
        let url = self.endpoint(&["diagrams"])?;
        let response = self.client.post(url).json(&diagram).send().await?;
        Self::read_json(response).await
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<DiagramSummary>> {
        self.get_json(&["diagrams", "user", owner]).await
    }

    async fn list_shared(&self) -> Result<Vec<DiagramSummary>> {
        self.get_json(&["diagrams", "shared"]).await
    }

    async fn fetch(&self, id: u64) -> Result<Diagram> {
        let id = id.to_string();
        self.get_json(&["diagrams", id.as_str()]).await
    }
}
