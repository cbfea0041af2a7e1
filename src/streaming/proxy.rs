use super::MediaStreamer;
use crate::backend::{BackendError, MediaType, ResolvedAsset, SizeVariant, immich::api_url};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Response headers copied from the backend onto the client response.
const FORWARDED_HEADERS: [header::HeaderName; 8] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::ETAG,
    header::LAST_MODIFIED,
    header::CACHE_CONTROL,
    header::CONTENT_DISPOSITION,
];

/// Streams asset bytes straight from the Immich asset endpoints, passing the
/// client's `Range` header through so video seeking works.
pub struct ProxyStreamer {
    client: reqwest::Client,
    base_url: Url,
}

impl ProxyStreamer {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    pub fn asset_url(
        &self,
        asset: &ResolvedAsset<'_>,
        size: SizeVariant,
    ) -> Result<Url, BackendError> {
        let id = asset.asset.id.as_str();
        let segments = match (asset.media_type, size) {
            (_, SizeVariant::Thumbnail | SizeVariant::Preview) => vec!["assets", id, "thumbnail"],
            (MediaType::Image, SizeVariant::Original) => vec!["assets", id, "original"],
            (MediaType::Video, SizeVariant::Original) => vec!["assets", id, "video", "playback"],
        };

        let mut url = api_url(
            &self.base_url,
            &segments,
            Some(asset.share_key),
            asset.password,
        )?;
        if size != SizeVariant::Original {
            url.query_pairs_mut().append_pair("size", size.as_str());
        }
        Ok(url)
    }
}

#[async_trait]
impl MediaStreamer for ProxyStreamer {
    async fn stream(
        &self,
        asset: ResolvedAsset<'_>,
        size: SizeVariant,
        range: Option<&HeaderValue>,
    ) -> Response {
        let url = match self.asset_url(&asset, size) {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to build asset URL: {}", e);
                return StatusCode::NOT_FOUND.into_response();
            }
        };

        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(header::RANGE, range.clone());
        }

        let upstream = match request.send().await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!("Failed to fetch asset {}: {}", asset.asset.id, e);
                return StatusCode::NOT_FOUND.into_response();
            }
        };

        let status = upstream.status();
        if status.is_client_error() && status != StatusCode::RANGE_NOT_SATISFIABLE {
            debug!("Backend answered {} for asset {}", status, asset.asset.id);
            return status.into_response();
        }
        if status.is_server_error() {
            warn!("Backend answered {} for asset {}", status, asset.asset.id);
            return StatusCode::NOT_FOUND.into_response();
        }

        let mut response = Response::builder().status(status);
        for name in FORWARDED_HEADERS {
            if let Some(value) = upstream.headers().get(&name) {
                response = response.header(name, value.clone());
            }
        }

        response
            .body(Body::from_stream(upstream.bytes_stream()))
            .unwrap_or_else(|e| {
                warn!("Failed to build streaming response: {}", e);
                StatusCode::NOT_FOUND.into_response()
            })
    }

    fn name(&self) -> &str {
        "Immich proxy"
    }
}
