use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use axum_test::TestServer;
use serde_json::json;
use sharegate::{
    Config,
    backend::{
        Asset, AssetKind, MediaType, ResolvedAsset, ShareBackend, ShareResolution, SizeVariant,
        immich::ImmichBackend,
    },
    create_app,
    fatal::FatalLatch,
    streaming::{MediaStreamer, proxy::ProxyStreamer},
};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

const PHOTO_ID: &str = "11111111-1111-4111-8111-111111111111";
const VIDEO_ID: &str = "22222222-2222-4222-8222-222222222222";
const ALBUM_PHOTO_ID: &str = "33333333-3333-4333-8333-333333333333";
const ORIGINAL_BYTES: &str = "0123456789";

fn asset_json(id: &str, kind: &str) -> serde_json::Value {
    json!({ "id": id, "type": kind, "originalFileName": format!("{id}.bin") })
}

async fn shared_link(Query(query): Query<HashMap<String, String>>) -> Response {
    let key = query.get("key").map(String::as_str).unwrap_or("");
    let password = query.get("password").map(String::as_str);

    match (key, password) {
        ("open", _) => Json(json!({
            "id": "link-1",
            "key": "open",
            "type": "INDIVIDUAL",
            "description": "Open share",
            "expiresAt": null,
            "allowDownload": true,
            "showMetadata": false,
            "assets": [asset_json(PHOTO_ID, "IMAGE"), asset_json(VIDEO_ID, "VIDEO")],
        }))
        .into_response(),
        ("locked", Some("pw")) => Json(json!({
            "key": "locked",
            "type": "INDIVIDUAL",
            "assets": [asset_json(PHOTO_ID, "IMAGE")],
        }))
        .into_response(),
        ("locked", _) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid password", "statusCode": 401 })),
        )
            .into_response(),
        ("album", _) => Json(json!({
            "key": "album",
            "type": "ALBUM",
            "assets": [],
            "album": { "id": "album-1", "albumName": "Trip" },
        }))
        .into_response(),
        ("expired", _) => Json(json!({
            "key": "expired",
            "type": "INDIVIDUAL",
            "expiresAt": "2001-01-01T00:00:00.000Z",
            "assets": [asset_json(PHOTO_ID, "IMAGE")],
        }))
        .into_response(),
        ("broken", _) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid share key" })),
        )
            .into_response(),
    }
}

async fn album(Path(id): Path<String>) -> Response {
    if id == "album-1" {
        Json(json!({ "id": id, "assets": [asset_json(ALBUM_PHOTO_ID, "IMAGE")] })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serves `ORIGINAL_BYTES`, honouring a single `bytes=a-b` range.
fn ranged_bytes(headers: &HeaderMap, content_type: &'static str) -> Response {
    let total = ORIGINAL_BYTES.len();
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split_once('-'))
        .and_then(|(start, end)| Some((start.parse::<usize>().ok()?, end.parse::<usize>().ok()?)));

    match range {
        Some((start, _)) if start >= total => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{total}"))],
        )
            .into_response(),
        Some((start, end)) => {
            let end = end.min(total - 1);
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (header::CONTENT_RANGE, format!("bytes {start}-{end}/{total}")),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                ORIGINAL_BYTES[start..=end].to_string(),
            )
                .into_response()
        }
        None => (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            ORIGINAL_BYTES,
        )
            .into_response(),
    }
}

fn known_asset(id: &str) -> bool {
    [PHOTO_ID, VIDEO_ID, ALBUM_PHOTO_ID].contains(&id)
}

async fn original(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !known_asset(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ranged_bytes(&headers, "image/jpeg")
}

async fn playback(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !known_asset(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    ranged_bytes(&headers, "video/mp4")
}

async fn thumbnail(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !known_asset(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let size = query.get("size").cloned().unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "image/webp")],
        format!("thumb-{size}"),
    )
        .into_response()
}

/// Starts a fake Immich server on an ephemeral port and returns its base URL.
async fn spawn_fake_immich() -> Url {
    let app = Router::new()
        .route("/api/server/ping", get(|| async { Json(json!({ "res": "pong" })) }))
        .route("/api/shared-links/me", get(shared_link))
        .route("/api/albums/{id}", get(album))
        .route("/api/assets/{id}/original", get(original))
        .route("/api/assets/{id}/video/playback", get(playback))
        .route("/api/assets/{id}/thumbnail", get(thumbnail));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Url::parse(&format!("http://{addr}")).unwrap()
}

fn backend(url: Url) -> ImmichBackend {
    ImmichBackend::new(url, Duration::from_secs(2)).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_ping() {
    let url = spawn_fake_immich().await;
    assert!(backend(url).accessible().await);
}

#[tokio::test]
async fn test_ping_unreachable() {
    let url = Url::parse("http://127.0.0.1:9").unwrap();
    assert!(!backend(url).accessible().await);
}

#[tokio::test]
async fn test_resolve_individual_share() {
    let backend = backend(spawn_fake_immich().await);
    let ShareResolution::Found(share) = backend.resolve_share("open", None).await.unwrap() else {
        panic!("open share should resolve");
    };

    assert_eq!(share.key, "open");
    assert_eq!(share.description.as_deref(), Some("Open share"));
    assert!(share.allow_download);
    assert_eq!(share.assets.len(), 2);
    assert_eq!(share.assets[0].kind, AssetKind::Image);
    assert_eq!(share.assets[1].kind, AssetKind::Video);
    assert_eq!(
        share.assets[1].original_file_name.as_deref(),
        Some(format!("{VIDEO_ID}.bin").as_str())
    );
}

#[tokio::test]
async fn test_resolve_password_protected_share() {
    let backend = backend(spawn_fake_immich().await);

    assert_eq!(
        backend.resolve_share("locked", None).await.unwrap(),
        ShareResolution::PasswordRequired
    );
    assert_eq!(
        backend.resolve_share("locked", Some("nope")).await.unwrap(),
        ShareResolution::PasswordRequired
    );
    assert!(matches!(
        backend.resolve_share("locked", Some("pw")).await.unwrap(),
        ShareResolution::Found(_)
    ));
}

#[tokio::test]
async fn test_resolve_album_share_fetches_album_assets() {
    let backend = backend(spawn_fake_immich().await);
    let ShareResolution::Found(share) = backend.resolve_share("album", None).await.unwrap() else {
        panic!("album share should resolve");
    };
    assert_eq!(share.assets.len(), 1);
    assert_eq!(share.assets[0].id, ALBUM_PHOTO_ID);
}

#[tokio::test]
async fn test_resolve_unknown_and_expired_shares() {
    let backend = backend(spawn_fake_immich().await);
    assert_eq!(
        backend.resolve_share("missing", None).await.unwrap(),
        ShareResolution::NotFound
    );
    assert_eq!(
        backend.resolve_share("expired", None).await.unwrap(),
        ShareResolution::NotFound
    );
    assert!(backend.resolve_share("broken", None).await.is_err());
}

#[tokio::test]
async fn test_proxy_streams_range() {
    let streamer = ProxyStreamer::new(spawn_fake_immich().await, Duration::from_secs(2)).unwrap();
    let asset = Asset::new(VIDEO_ID, AssetKind::Video);
    let view = ResolvedAsset {
        share_key: "open",
        password: None,
        asset: &asset,
        media_type: MediaType::Video,
    };

    let range = HeaderValue::from_static("bytes=2-5");
    let response = streamer
        .stream(view, SizeVariant::Original, Some(&range))
        .await;
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(body_text(response).await, "2345");

    let response = streamer.stream(view, SizeVariant::Original, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, ORIGINAL_BYTES);

    let range = HeaderValue::from_static("bytes=50-60");
    let response = streamer
        .stream(view, SizeVariant::Original, Some(&range))
        .await;
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn test_proxy_streams_sizes() {
    let streamer = ProxyStreamer::new(spawn_fake_immich().await, Duration::from_secs(2)).unwrap();
    let asset = Asset::new(PHOTO_ID, AssetKind::Image);
    let view = ResolvedAsset {
        share_key: "open",
        password: None,
        asset: &asset,
        media_type: MediaType::Image,
    };

    let response = streamer.stream(view, SizeVariant::Preview, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(body_text(response).await, "thumb-preview");

    let response = streamer.stream(view, SizeVariant::Original, None).await;
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let missing = Asset::new("44444444-4444-4444-8444-444444444444", AssetKind::Image);
    let response = streamer
        .stream(
            ResolvedAsset {
                asset: &missing,
                ..view
            },
            SizeVariant::Original,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gateway_end_to_end() {
    let url = spawn_fake_immich().await;
    let mut config = Config::default();
    config.backend.url = url.to_string();
    config.app.public_base_url = "https://share.example.com".to_string();
    let server = TestServer::new(create_app(config, FatalLatch::new()).unwrap()).unwrap();

    server.get("/share/healthcheck").await.assert_status_ok();

    let response = server
        .get(&format!("/share/photo/open/{PHOTO_ID}/thumbnail"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "thumb-thumbnail");

    let response = server
        .get(&format!("/share/video/open/{VIDEO_ID}"))
        .add_header(header::RANGE, HeaderValue::from_static("bytes=0-3"))
        .await;
    assert_eq!(response.status_code(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.text(), "0123");

    // Locked share without credential, then with one
    server
        .get(&format!("/share/photo/locked/{PHOTO_ID}"))
        .await
        .assert_status_not_found();
    let unlock = server
        .post("/share/unlock")
        .json(&json!({ "key": "locked", "password": "pw" }))
        .await;
    let set_cookie = unlock.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    let cookie = HeaderValue::from_str(set_cookie.split(';').next().unwrap()).unwrap();
    let response = server
        .get(&format!("/share/photo/locked/{PHOTO_ID}"))
        .add_header(header::COOKIE, cookie)
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), ORIGINAL_BYTES);

    let listing: serde_json::Value = server.get("/share/album/api").await.json();
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["media"][0]["id"], ALBUM_PHOTO_ID);
}
