use super::{AssetPath, ListingQuery, ListingResponse, MediaItem, ShareError, ShareMode};
use crate::backend::{
    Asset, AssetKind, ShareBackend, ShareDescriptor, ShareResolution, SizeVariant, is_id, is_key,
};

pub const DEFAULT_PAGE: usize = 1;

/// Syntactic checks on the asset route parameters, in order: key and id,
/// then the optional size segment.
pub fn validate_asset_path(path: &AssetPath) -> Result<SizeVariant, ShareError> {
    if !is_key(&path.key) {
        return Err(ShareError::InvalidKey);
    }
    if !is_id(&path.id) {
        return Err(ShareError::InvalidId);
    }
    match path.size.as_deref() {
        None => Ok(SizeVariant::default()),
        Some(size) => size
            .parse()
            .map_err(|_| ShareError::InvalidSize(size.to_string())),
    }
}

pub fn parse_mode(mode: Option<&str>) -> Result<ShareMode, ShareError> {
    match mode {
        None => Ok(ShareMode::View),
        Some("download") => Ok(ShareMode::Download),
        Some(other) => Err(ShareError::InvalidMode(other.to_string())),
    }
}

/// Resolves a share that has at least one asset. Locked, missing and empty
/// shares are all `ShareNotFound`.
pub async fn resolve_servable_share(
    backend: &dyn ShareBackend,
    key: &str,
    password: Option<&str>,
) -> Result<ShareDescriptor, ShareError> {
    backend
        .resolve_share(key, password)
        .await?
        .into_servable()
        .ok_or(ShareError::ShareNotFound)
}

/// Like [`resolve_servable_share`] but keeps `PasswordRequired` apart so the
/// share view can prompt for it.
pub async fn resolve_for_view(
    backend: &dyn ShareBackend,
    key: &str,
    password: Option<&str>,
) -> Result<Option<ShareDescriptor>, ShareError> {
    match backend.resolve_share(key, password).await? {
        ShareResolution::PasswordRequired => Ok(None),
        other => other
            .into_servable()
            .map(Some)
            .ok_or(ShareError::ShareNotFound),
    }
}

/// Parses a positive integer, falling back to `default` for anything else.
pub fn positive_or(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Items of 1-indexed `page`. Pages past the end are empty.
pub fn page_slice(assets: &[Asset], page: usize, page_size: usize) -> &[Asset] {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= assets.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(assets.len());
    &assets[start..end]
}

pub fn media_item(base_url: &str, key: &str, asset: &Asset) -> MediaItem {
    let base = base_url.trim_end_matches('/');
    let original_route = match asset.kind {
        AssetKind::Video => "video",
        _ => "photo",
    };
    MediaItem {
        id: asset.id.clone(),
        thumb_url: format!("{}/share/photo/{}/{}/thumbnail", base, key, asset.id),
        preview_url: format!("{}/share/photo/{}/{}/preview", base, key, asset.id),
        original_url: format!(
            "{}/share/{}/{}/{}/original",
            base, original_route, key, asset.id
        ),
    }
}

pub fn build_listing(
    share: &ShareDescriptor,
    key: &str,
    query: &ListingQuery,
    base_url: &str,
    default_page_size: usize,
) -> ListingResponse {
    let page = positive_or(query.page.as_deref(), DEFAULT_PAGE);
    let page_size = positive_or(query.page_size.as_deref(), default_page_size.max(1));

    ListingResponse {
        media: page_slice(&share.assets, page, page_size)
            .iter()
            .map(|asset| media_item(base_url, key, asset))
            .collect(),
        page,
        page_size,
        total: share.assets.len(),
    }
}
