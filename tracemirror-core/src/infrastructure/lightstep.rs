use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{StatusCode, header};
use serde::{Deserialize, de::DeserializeOwned};
use std::{fmt, time::Duration};
use tracing::debug;
use url::Url;

use crate::{
    domain::{Exemplar, RemoteService, StreamId, TimeWindow},
    error::CatalogError,
    ports::CatalogClient,
};

pub const DEFAULT_LIGHTSTEP_HOST: &str = "https://api.lightstep.com";
const API_VERSION: &str = "v0.2";
const MAX_ERROR_BODY: usize = 512;

/// Connection settings for the Lightstep public API.
#[derive(Clone)]
pub struct LightstepSettings {
    pub host: Url,
    pub organization: String,
    pub project: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl fmt::Debug for LightstepSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightstepSettings")
            .field("host", &self.host.as_str())
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Catalog client backed by the Lightstep public REST API.
#[derive(Clone)]
pub struct LightstepCatalogClient {
    http: reqwest::Client,
    project_root: Url,
    api_key: String,
}

impl fmt::Debug for LightstepCatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LightstepCatalogClient")
            .field("project_root", &self.project_root.as_str())
            .field("http_client", &self.http)
            .finish()
    }
}

impl LightstepCatalogClient {
    pub fn new(settings: &LightstepSettings) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        let mut project_root = settings.host.clone();
        project_root
            .path_segments_mut()
            .map_err(|_| {
                CatalogError::InvalidEndpoint(settings.host.to_string())
            })?
            .pop_if_empty()
            .extend([
                "public",
                API_VERSION,
                settings.organization.as_str(),
                "projects",
                settings.project.as_str(),
            ]);

        Ok(Self {
            http,
            project_root,
            api_key: settings.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.project_root.clone();
        // project_root was validated as a base URL in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, CatalogError> {
        debug!(url = %url, "catalog GET");

        let response = self
            .http
            .get(url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, url.path(), body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CatalogError::Parse(format!("{}: {e}", url.path())))
    }
}

#[async_trait]
impl CatalogClient for LightstepCatalogClient {
    async fn list_services(&self) -> Result<Vec<RemoteService>, CatalogError> {
        let url = self.endpoint(&["directory", "services"]);
        let envelope: Envelope<ServiceList> = self.get_json(url).await?;
        Ok(envelope.into_services())
    }

    async fn list_streams(&self) -> Result<Vec<StreamId>, CatalogError> {
        let url = self.endpoint(&["streams"]);
        let envelope: Envelope<Vec<StreamItem>> = self.get_json(url).await?;
        Ok(envelope.data.into_iter().map(|s| StreamId(s.id)).collect())
    }

    async fn stream_exemplars(
        &self,
        stream: &StreamId,
        window: &TimeWindow,
    ) -> Result<Option<Vec<Exemplar>>, CatalogError> {
        let mut url = self.endpoint(&["streams", stream.as_str(), "timeseries"]);
        url.query_pairs_mut()
            .append_pair("oldest-time", &format_time(window.oldest))
            .append_pair("youngest-time", &format_time(window.youngest))
            .append_pair("resolution-ms", &window.resolution_ms().to_string())
            .append_pair("include-exemplars", "1");

        let envelope: Envelope<TimeseriesData> = self.get_json(url).await?;
        Ok(envelope.into_exemplars())
    }
}

fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn map_status(status: StatusCode, path: &str, body: String) -> CatalogError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CatalogError::Unauthorized
        }
        StatusCode::TOO_MANY_REQUESTS => CatalogError::RateLimited,
        StatusCode::NOT_FOUND => CatalogError::NotFound(path.to_string()),
        other => {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            CatalogError::Status {
                status: other.as_u16(),
                body,
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceList {
    #[serde(default)]
    items: Vec<ServiceItem>,
}

#[derive(Debug, Deserialize)]
struct ServiceItem {
    attributes: ServiceAttributes,
}

/// Either field may be absent or null; blanks are skipped downstream.
#[derive(Debug, Deserialize)]
struct ServiceAttributes {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    last_seen: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamItem {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct TimeseriesData {
    #[serde(default)]
    attributes: Option<TimeseriesAttributes>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeseriesAttributes {
    #[serde(default)]
    exemplars: Option<Vec<Exemplar>>,
}

impl Envelope<ServiceList> {
    fn into_services(self) -> Vec<RemoteService> {
        self.data
            .items
            .into_iter()
            .map(|item| RemoteService {
                name: item.attributes.name.unwrap_or_default(),
                last_seen: item.attributes.last_seen.unwrap_or_default(),
            })
            .collect()
    }
}

impl Envelope<TimeseriesData> {
    fn into_exemplars(self) -> Option<Vec<Exemplar>> {
        self.data.attributes.and_then(|attrs| attrs.exemplars)
    }
}
