use super::{Asset, BackendError, ShareBackend, ShareDescriptor, ShareResolution, ShareType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedLinkResponse {
    key: String,
    #[serde(rename = "type")]
    share_type: ShareType,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    allow_download: bool,
    #[serde(default)]
    show_metadata: bool,
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    album: Option<AlbumRef>,
}

#[derive(Deserialize)]
struct AlbumRef {
    id: String,
}

#[derive(Deserialize)]
struct AlbumResponse {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct PingResponse {
    res: String,
}

/// Builds `<base>/api/<segments...>?key=..&password=..`.
///
/// Path segments are appended to whatever path the base URL already has, so
/// a server mounted under a sub-path keeps working.
pub fn api_url(
    base: &Url,
    segments: &[&str],
    key: Option<&str>,
    password: Option<&str>,
) -> Result<Url, BackendError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .push("api")
        .extend(segments);

    if key.is_some() || password.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(key) = key {
            query.append_pair("key", key);
        }
        if let Some(password) = password {
            query.append_pair("password", password);
        }
    }

    Ok(url)
}

/// Share resolution against an Immich server's public shared-link API.
pub struct ImmichBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl ImmichBackend {
    pub fn new(base_url: Url, connect_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    async fn fetch_album_assets(
        &self,
        album_id: &str,
        key: &str,
        password: Option<&str>,
    ) -> Result<Vec<Asset>, BackendError> {
        let url = api_url(&self.base_url, &["albums", album_id], Some(key), password)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::UnexpectedStatus(response.status()));
        }
        let album: AlbumResponse = response.json().await?;
        Ok(album.assets)
    }
}

#[async_trait]
impl ShareBackend for ImmichBackend {
    async fn accessible(&self) -> bool {
        let url = match api_url(&self.base_url, &["server", "ping"], None, None) {
            Ok(url) => url,
            Err(_) => return false,
        };

        match self.client.get(url).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<PingResponse>()
                .await
                .map(|ping| ping.res == "pong")
                .unwrap_or(false),
            Ok(response) => {
                warn!("Backend ping returned {}", response.status());
                false
            }
            Err(e) => {
                warn!("Backend ping failed: {}", e);
                false
            }
        }
    }

    async fn resolve_share(
        &self,
        key: &str,
        password: Option<&str>,
    ) -> Result<ShareResolution, BackendError> {
        let url = api_url(&self.base_url, &["shared-links", "me"], Some(key), password)?;
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let body = response
                .json::<ErrorResponse>()
                .await
                .map(|e| e.message)
                .unwrap_or_default();
            return Ok(if body.to_lowercase().contains("password") {
                ShareResolution::PasswordRequired
            } else {
                debug!("Backend rejected share key: {}", body);
                ShareResolution::NotFound
            });
        }
        if status.is_client_error() {
            return Ok(ShareResolution::NotFound);
        }
        if !status.is_success() {
            return Err(BackendError::UnexpectedStatus(status));
        }

        let link: SharedLinkResponse = response.json().await?;

        if let Some(expires_at) = link.expires_at
            && expires_at <= Utc::now()
        {
            debug!("Share link expired at {}", expires_at);
            return Ok(ShareResolution::NotFound);
        }

        let assets = match (&link.share_type, &link.album) {
            (ShareType::Album, Some(album)) => {
                self.fetch_album_assets(&album.id, key, password).await?
            }
            _ => link.assets,
        };

        Ok(ShareResolution::Found(ShareDescriptor {
            key: link.key,
            share_type: link.share_type,
            description: link.description,
            expires_at: link.expires_at,
            allow_download: link.allow_download,
            show_metadata: link.show_metadata,
            assets,
        }))
    }

    fn name(&self) -> &str {
        "Immich"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_appends_to_base_path() {
        let base = Url::parse("http://immich:2283").unwrap();
        let url = api_url(&base, &["shared-links", "me"], Some("abc"), None).unwrap();
        assert_eq!(url.as_str(), "http://immich:2283/api/shared-links/me?key=abc");

        let base = Url::parse("https://photos.example.com/immich/").unwrap();
        let url = api_url(&base, &["server", "ping"], None, None).unwrap();
        assert_eq!(url.as_str(), "https://photos.example.com/immich/api/server/ping");
    }

    #[test]
    fn api_url_encodes_password() {
        let base = Url::parse("http://immich:2283").unwrap();
        let url = api_url(&base, &["shared-links", "me"], Some("k"), Some("a b&c")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://immich:2283/api/shared-links/me?key=k&password=a+b%26c"
        );
    }

    #[test]
    fn api_url_rejects_opaque_base() {
        let base = Url::parse("mailto:someone@example.com").unwrap();
        assert!(matches!(
            api_url(&base, &["server", "ping"], None, None),
            Err(BackendError::InvalidUrl(_))
        ));
    }
}
