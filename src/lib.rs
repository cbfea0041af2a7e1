use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod backend;
pub mod cipher;
pub mod fatal;
pub mod gate;
pub mod session;
pub mod share;
pub mod startup_checks;
pub mod streaming;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
    pub listing: ListingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    /// External URL the gateway is reachable at, used in listing URLs.
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub credential_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListingConfig {
    pub default_page_size: usize,
}

impl Config {
    /// Reads a TOML config file. Missing sections and keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml_edit::de::from_str::<Config>(&content)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml_edit::de::Error),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "sharegate".to_string(),
            log_level: "info".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://immich-server:2283".to_string(),
            connect_timeout_seconds: 10,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "share_session".to_string(),
            credential_ttl_seconds: 3600,
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
        }
    }
}

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, Method, header},
    middleware,
    routing::{get, post},
};
use backend::{BackendError, DynShareBackend, immich::ImmichBackend};
use cipher::SessionCipher;
use fatal::FatalLatch;
use session::SessionSettings;
use std::sync::Arc;
use std::time::Duration;
use streaming::{DynMediaStreamer, proxy::ProxyStreamer};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub backend: DynShareBackend,
    pub streamer: DynMediaStreamer,
    pub cipher: Arc<SessionCipher>,
    pub session: SessionSettings,
    pub config: Config,
}

impl FromRef<AppState> for SessionSettings {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session.clone()
    }
}

/// Builds the router against the Immich server named in the config, with
/// fresh cipher and cookie-signing keys.
pub fn create_app(config: Config, fatal: FatalLatch) -> Result<Router, BackendError> {
    let base_url = url::Url::parse(&config.backend.url)
        .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", config.backend.url, e)))?;
    let connect_timeout = Duration::from_secs(config.backend.connect_timeout_seconds);

    let backend = Arc::new(ImmichBackend::new(base_url.clone(), connect_timeout)?);
    let streamer = Arc::new(ProxyStreamer::new(base_url, connect_timeout)?);

    Ok(create_app_with(config, backend, streamer, fatal))
}

pub fn create_app_with(
    config: Config,
    backend: DynShareBackend,
    streamer: DynMediaStreamer,
    fatal: FatalLatch,
) -> Router {
    tracing::info!(
        "Serving shares from {} backend, streaming through {}",
        backend.name(),
        streamer.name()
    );

    let app_state = AppState {
        backend,
        streamer,
        cipher: Arc::new(SessionCipher::generate()),
        session: SessionSettings::generate(config.session.cookie_name.clone()),
        config,
    };

    // Routes that act on a share with the caller's stored password
    let gated = Router::new()
        .route("/share/{key}", get(share::share_view_handler))
        .route("/share/{key}/{mode}", get(share::share_view_handler))
        .route("/share/photo/{key}/{id}", get(share::photo_handler))
        .route("/share/photo/{key}/{id}/{size}", get(share::photo_handler))
        .route("/share/video/{key}/{id}", get(share::video_handler))
        .route("/share/video/{key}/{id}/{size}", get(share::video_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            gate::password_gate,
        ));

    Router::new()
        .route("/healthcheck", get(share::healthcheck_handler))
        .route("/share/healthcheck", get(share::healthcheck_handler))
        .route("/share/unlock", post(share::unlock_handler))
        .route("/share/{key}/api", get(share::listing_handler))
        .merge(gated)
        .method_not_allowed_fallback(share::fallback_handler)
        .fallback(share::fallback_handler)
        .layer(cors_layer())
        .layer(CatchPanicLayer::custom(fatal.panic_handler()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let user_agent = request
                        .headers()
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %user_agent,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::RANGE,
            header::ACCEPT,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ])
}
