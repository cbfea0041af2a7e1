use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetKind {
    Image,
    Video,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    /// Kind as recorded by the backend. Streaming uses the route's
    /// [`MediaType`] instead.
    #[serde(rename = "type", default)]
    pub kind: AssetKind,
    #[serde(default)]
    pub original_file_name: Option<String>,
    #[serde(default)]
    pub original_mime_type: Option<String>,
    #[serde(default)]
    pub file_created_at: Option<String>,
}

impl Asset {
    pub fn new(id: impl Into<String>, kind: AssetKind) -> Self {
        Self {
            id: id.into(),
            kind,
            original_file_name: None,
            original_mime_type: None,
            file_created_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShareType {
    Album,
    Individual,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDescriptor {
    pub key: String,
    #[serde(rename = "type")]
    pub share_type: ShareType,
    pub description: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub allow_download: bool,
    pub show_metadata: bool,
    #[serde(skip)]
    pub assets: Vec<Asset>,
}

impl ShareDescriptor {
    pub fn new(key: impl Into<String>, assets: Vec<Asset>) -> Self {
        Self {
            key: key.into(),
            share_type: ShareType::Individual,
            description: None,
            expires_at: None,
            allow_download: true,
            show_metadata: true,
            assets,
        }
    }

    pub fn find_asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShareResolution {
    Found(ShareDescriptor),
    /// The share exists but the supplied password is missing or wrong.
    PasswordRequired,
    NotFound,
}

impl ShareResolution {
    /// The descriptor, if it has at least one asset.
    pub fn into_servable(self) -> Option<ShareDescriptor> {
        match self {
            ShareResolution::Found(share) if !share.assets.is_empty() => Some(share),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeVariant {
    Thumbnail,
    Preview,
    #[default]
    Original,
}

impl SizeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeVariant::Thumbnail => "thumbnail",
            SizeVariant::Preview => "preview",
            SizeVariant::Original => "original",
        }
    }
}

impl FromStr for SizeVariant {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(SizeVariant::Thumbnail),
            "preview" => Ok(SizeVariant::Preview),
            "original" => Ok(SizeVariant::Original),
            _ => Err(()),
        }
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an asset is streamed, taken from the route (`photo` or `video`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn route_segment(&self) -> &'static str {
        match self {
            MediaType::Image => "photo",
            MediaType::Video => "video",
        }
    }
}

/// Per-request view of an asset resolved from a share. Borrows the asset
/// from the descriptor returned by the backend and lives only as long as the
/// request.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedAsset<'a> {
    pub share_key: &'a str,
    pub password: Option<&'a str>,
    pub asset: &'a Asset,
    pub media_type: MediaType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_variant_parsing() {
        assert_eq!("thumbnail".parse::<SizeVariant>(), Ok(SizeVariant::Thumbnail));
        assert_eq!("preview".parse::<SizeVariant>(), Ok(SizeVariant::Preview));
        assert_eq!("original".parse::<SizeVariant>(), Ok(SizeVariant::Original));
        assert!("large".parse::<SizeVariant>().is_err());
        assert!("Thumbnail".parse::<SizeVariant>().is_err());
        assert_eq!(SizeVariant::default(), SizeVariant::Original);
    }

    #[test]
    fn asset_kind_tolerates_unknown_values() {
        let asset: Asset =
            serde_json::from_str(r#"{"id":"a","type":"AUDIO","originalFileName":"x.mp3"}"#)
                .unwrap();
        assert_eq!(asset.kind, AssetKind::Other);
        assert_eq!(asset.original_file_name.as_deref(), Some("x.mp3"));

        let asset: Asset = serde_json::from_str(r#"{"id":"b","type":"VIDEO"}"#).unwrap();
        assert_eq!(asset.kind, AssetKind::Video);
    }

    #[test]
    fn empty_share_is_not_servable() {
        let empty = ShareResolution::Found(ShareDescriptor::new("k", vec![]));
        assert!(empty.into_servable().is_none());
        assert!(ShareResolution::PasswordRequired.into_servable().is_none());

        let share = ShareDescriptor::new("k", vec![Asset::new("a", AssetKind::Image)]);
        assert_eq!(
            ShareResolution::Found(share.clone()).into_servable(),
            Some(share)
        );
    }
}
