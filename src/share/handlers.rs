use super::{
    AssetPath, ListingError, ListingQuery, ListingResponse, PasswordRequiredResponse, ShareError,
    ShareMode, SharePath, ShareSummary, UnlockRequest, core,
};
use crate::AppState;
use crate::backend::{AssetKind, MediaType, ResolvedAsset, SizeVariant, is_key};
use crate::gate::{SessionCredential, SharePassword};
use crate::session::SessionStore;
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, error, info};

pub async fn healthcheck_handler(State(app_state): State<AppState>) -> Response {
    if app_state.backend.accessible().await {
        (StatusCode::OK, "ok").into_response()
    } else {
        StatusCode::SERVICE_UNAVAILABLE.into_response()
    }
}

pub async fn fallback_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Stores an encrypted, time-limited credential for `key` in the caller's
/// session. The password is not checked here; a wrong one simply fails to
/// resolve later. Malformed keys are ignored. Always answers 200.
pub async fn unlock_handler(
    State(app_state): State<AppState>,
    mut session: SessionStore,
    body: Bytes,
) -> Response {
    let request: UnlockRequest = serde_json::from_slice(&body).unwrap_or_default();

    let (Some(key), Some(password)) = (request.key, request.password) else {
        debug!("Unlock request without key or password, nothing stored");
        return StatusCode::OK.into_response();
    };
    if !is_key(&key) {
        debug!("Unlock request for malformed share key, nothing stored");
        return StatusCode::OK.into_response();
    }

    let ttl_seconds = app_state.config.session.credential_ttl_seconds;
    let pair = match SessionCredential::new(password, Utc::now(), ttl_seconds)
        .and_then(|credential| credential.seal(&app_state.cipher))
    {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to issue share credential: {}", e);
            return StatusCode::OK.into_response();
        }
    };

    session.insert(key.clone(), pair);
    match session.to_set_cookie(&app_state.session) {
        Ok(cookie) => {
            info!("Stored unlock credential for share {}", key);
            (StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response()
        }
        Err(e) => {
            error!("Failed to build session cookie: {}", e);
            StatusCode::OK.into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn photo_handler(
    State(app_state): State<AppState>,
    Path(path): Path<AssetPath>,
    Extension(SharePassword(password)): Extension<SharePassword>,
    headers: HeaderMap,
) -> Result<Response, ShareError> {
    serve_asset(&app_state, MediaType::Image, path, password, &headers).await
}

#[axum::debug_handler]
pub async fn video_handler(
    State(app_state): State<AppState>,
    Path(path): Path<AssetPath>,
    Extension(SharePassword(password)): Extension<SharePassword>,
    headers: HeaderMap,
) -> Result<Response, ShareError> {
    serve_asset(&app_state, MediaType::Video, path, password, &headers).await
}

async fn serve_asset(
    app_state: &AppState,
    media_type: MediaType,
    path: AssetPath,
    password: Option<String>,
    headers: &HeaderMap,
) -> Result<Response, ShareError> {
    let size = core::validate_asset_path(&path)?;

    let share =
        core::resolve_servable_share(app_state.backend.as_ref(), &path.key, password.as_deref())
            .await?;
    let asset = share
        .find_asset(&path.id)
        .ok_or(ShareError::AssetNotFound)?;

    let view = ResolvedAsset {
        share_key: &path.key,
        password: password.as_deref(),
        asset,
        media_type,
    };
    debug!(
        "Streaming asset {} of share {} as {:?} ({})",
        asset.id, path.key, media_type, size
    );

    Ok(app_state
        .streamer
        .stream(view, size, headers.get(header::RANGE))
        .await)
}

pub async fn share_view_handler(
    State(app_state): State<AppState>,
    Path(path): Path<SharePath>,
    Extension(SharePassword(password)): Extension<SharePassword>,
    headers: HeaderMap,
) -> Result<Response, ShareError> {
    if !is_key(&path.key) {
        return Err(ShareError::InvalidKey);
    }
    let mode = core::parse_mode(path.mode.as_deref())?;

    let Some(share) =
        core::resolve_for_view(app_state.backend.as_ref(), &path.key, password.as_deref()).await?
    else {
        let body = PasswordRequiredResponse {
            password_required: true,
            key: &path.key,
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(body)).into_response());
    };

    match mode {
        ShareMode::View => {
            let media = share
                .assets
                .iter()
                .map(|asset| core::media_item(&app_state.config.app.public_base_url, &path.key, asset))
                .collect();
            let summary = ShareSummary {
                share: &share,
                total: share.assets.len(),
                media,
            };
            Ok(Json(summary).into_response())
        }
        ShareMode::Download => {
            // Archive bundling of multi-asset shares is not offered
            let [asset] = share.assets.as_slice() else {
                return Err(ShareError::DownloadUnavailable);
            };
            if !share.allow_download {
                return Err(ShareError::DownloadUnavailable);
            }

            let media_type = match asset.kind {
                AssetKind::Video => MediaType::Video,
                _ => MediaType::Image,
            };
            let view = ResolvedAsset {
                share_key: &path.key,
                password: password.as_deref(),
                asset,
                media_type,
            };
            let mut response = app_state
                .streamer
                .stream(view, SizeVariant::Original, headers.get(header::RANGE))
                .await;

            let filename = asset.original_file_name.as_deref().unwrap_or(&asset.id);
            if let Ok(value) = HeaderValue::from_str(&attachment_disposition(filename)) {
                response
                    .headers_mut()
                    .insert(header::CONTENT_DISPOSITION, value);
            }
            Ok(response)
        }
    }
}

fn attachment_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

pub async fn listing_handler(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<ListingResponse>, ListingError> {
    if !is_key(&key) {
        return Err(ShareError::InvalidKey.into());
    }

    // Listing only exposes derived URLs, so it resolves without a password
    let share = core::resolve_servable_share(app_state.backend.as_ref(), &key, None).await?;

    Ok(Json(core::build_listing(
        &share,
        &key,
        &query,
        &app_state.config.app.public_base_url,
        app_state.config.listing.default_page_size,
    )))
}
