//! URI-addressed, read-only Sonarr resources.
//!
//! Two templates are served:
//! - `sonarr://series/{series_id}/poster`: the series poster as a base64 blob
//! - `sonarr://episode/{episode_id}`: an episode record as JSON text
//!
//! Nothing is cached; every read goes to Sonarr.

use crate::error::{AdapterError, ToolError};
use crate::shaping;
use base64::Engine as _;
use rmcp::model::{ReadResourceResult, ResourceContents, ResourceTemplate};
use serde_json::{Value, json};
use sonarr_mcp_upstream::{SonarrClient, UpstreamRequest};

pub const SCHEME: &str = "sonarr://";
pub const POSTER_TEMPLATE: &str = "sonarr://series/{series_id}/poster";
pub const EPISODE_TEMPLATE: &str = "sonarr://episode/{episode_id}";

/// A parsed resource URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef {
    SeriesPoster(i64),
    Episode(i64),
}

impl ResourceRef {
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] for URIs outside the `sonarr://` templates or
    /// with non-numeric ids.
    pub fn parse(uri: &str) -> Result<Self, ToolError> {
        let invalid = |why: &str| ToolError::InvalidArguments(format!("{uri}: {why}"));
        let rest = uri
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("expected a sonarr:// URI"))?;
        let segments: Vec<&str> = rest.trim_end_matches('/').split('/').collect();
        let parse_id = |raw: &str| {
            raw.parse::<i64>()
                .ok()
                .filter(|id| *id > 0)
                .ok_or_else(|| invalid("id must be a positive integer"))
        };
        match segments.as_slice() {
            ["series", id, "poster"] => Ok(Self::SeriesPoster(parse_id(id)?)),
            ["episode", id] => Ok(Self::Episode(parse_id(id)?)),
            _ => Err(invalid("unknown resource")),
        }
    }
}

#[derive(Clone)]
pub struct ResourceProvider {
    client: SonarrClient,
    templates: Vec<ResourceTemplate>,
}

impl ResourceProvider {
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] if the template descriptors cannot be built.
    pub fn new(client: SonarrClient) -> crate::error::Result<Self> {
        let templates = [
            json!({
                "uriTemplate": POSTER_TEMPLATE,
                "name": "series_poster",
                "title": "Series poster",
                "description": "Poster image of a series in the Sonarr library",
                "mimeType": "image/jpeg",
            }),
            json!({
                "uriTemplate": EPISODE_TEMPLATE,
                "name": "episode",
                "title": "Episode details",
                "description": "Episode information including file path and quality",
                "mimeType": "application/json",
            }),
        ]
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<ResourceTemplate>, _>>()
        .map_err(|e| AdapterError::Config(format!("resource template: {e}")))?;

        Ok(Self { client, templates })
    }

    #[must_use]
    pub fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.clone()
    }

    /// Read one resource.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] for malformed URIs, [`ToolError::NotFound`] when the
    /// series, its poster, or the episode does not exist, and upstream failures otherwise.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, ToolError> {
        let contents = match ResourceRef::parse(uri)? {
            ResourceRef::SeriesPoster(id) => self.poster(uri, id).await?,
            ResourceRef::Episode(id) => self.episode(uri, id).await?,
        };
        Ok(ReadResourceResult {
            contents: vec![contents],
        })
    }

    async fn poster(&self, uri: &str, series_id: i64) -> Result<ResourceContents, ToolError> {
        let series = self
            .client
            .call_json(&UpstreamRequest::get(format!("series/{series_id}")))
            .await?;
        let url = poster_url(&series)
            .ok_or_else(|| ToolError::NotFound(format!("series {series_id} has no poster image")))?;

        let response = self.client.fetch_media(url).await?;
        let (bytes, mime_type) = response.into_binary()?;
        let blob = base64::engine::general_purpose::STANDARD.encode(bytes);
        contents(json!({
            "uri": uri,
            "mimeType": mime_type,
            "blob": blob,
        }))
    }

    async fn episode(&self, uri: &str, episode_id: i64) -> Result<ResourceContents, ToolError> {
        let episode = self
            .client
            .call_json(&UpstreamRequest::get(format!("episode/{episode_id}")))
            .await?;
        let record = shaping::episode_record(&episode);
        let text = serde_json::to_string_pretty(&record).unwrap_or_else(|_| record.to_string());
        contents(json!({
            "uri": uri,
            "mimeType": "application/json",
            "text": text,
        }))
    }
}

/// Media path of the first `poster` image.
fn poster_url(series: &Value) -> Option<&str> {
    series
        .get("images")?
        .as_array()?
        .iter()
        .find(|img| img.get("coverType").and_then(Value::as_str) == Some("poster"))
        .and_then(|img| {
            img.get("url")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
        })
}

fn contents(v: Value) -> Result<ResourceContents, ToolError> {
    serde_json::from_value(v).map_err(|e| ToolError::UpstreamError {
        status: None,
        body: Value::String(format!("invalid resource contents: {e}")),
    })
}
