use crate::cipher::EncryptedPair;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, HeaderValue, header, request::Parts},
};
use base64::{Engine, engine::general_purpose};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Invalid signing key")]
    InvalidKey,

    #[error("Invalid cookie header")]
    InvalidHeader,
}

/// Cookie name plus the signing key generated at process start.
#[derive(Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    signing_key: Arc<[u8; 32]>,
}

impl SessionSettings {
    pub fn generate(cookie_name: impl Into<String>) -> Self {
        use rand::{Rng, rng};

        Self {
            cookie_name: cookie_name.into(),
            signing_key: Arc::new(rng().random::<[u8; 32]>()),
        }
    }

    pub fn signing_key(&self) -> &[u8] {
        self.signing_key.as_slice()
    }
}

/// Per-caller mapping from share key to the encrypted credential for that
/// share, carried in a signed cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStore {
    entries: HashMap<String, EncryptedPair>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, share_key: &str) -> Option<&EncryptedPair> {
        self.entries.get(share_key)
    }

    pub fn insert(&mut self, share_key: String, pair: EncryptedPair) {
        self.entries.insert(share_key, pair);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads the store from the request cookies. A missing, unsigned or
    /// undecodable cookie yields an empty store.
    pub fn from_headers(headers: &HeaderMap, settings: &SessionSettings) -> Self {
        let Some(signed_value) = get_cookie_value(headers, &settings.cookie_name) else {
            return Self::new();
        };

        let Some(payload) = verify_signed_cookie(settings.signing_key(), &signed_value) else {
            debug!("Discarding session cookie with invalid signature");
            return Self::new();
        };

        general_purpose::URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<HashMap<String, EncryptedPair>>(&bytes).ok())
            .map(|entries| Self { entries })
            .unwrap_or_default()
    }

    pub fn to_set_cookie(&self, settings: &SessionSettings) -> Result<HeaderValue, SessionError> {
        let json = serde_json::to_vec(&self.entries)?;
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(json);
        let signed_value = create_signed_cookie(settings.signing_key(), &payload)?;

        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Strict",
            settings.cookie_name, signed_value
        );
        HeaderValue::from_str(&cookie).map_err(|_| SessionError::InvalidHeader)
    }
}

impl<S> FromRequestParts<S> for SessionStore
where
    S: Send + Sync,
    SessionSettings: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = SessionSettings::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &settings))
    }
}

pub fn create_signed_cookie(secret: &[u8], value: &str) -> Result<String, SessionError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| SessionError::InvalidKey)?;
    mac.update(value.as_bytes());
    let signature = mac.finalize().into_bytes();
    let signature_b64 = general_purpose::URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{}:{}", value, signature_b64))
}

/// Returns the signed payload when the signature matches.
pub fn verify_signed_cookie<'a>(secret: &[u8], signed_value: &'a str) -> Option<&'a str> {
    if let Some((value, signature_b64)) = signed_value.split_once(':')
        && let Ok(signature) = general_purpose::URL_SAFE_NO_PAD.decode(signature_b64)
        && let Ok(mut mac) = HmacSha256::new_from_slice(secret)
    {
        mac.update(value.as_bytes());
        if mac.verify_slice(&signature).is_ok() {
            return Some(value);
        }
    }
    None
}

pub fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (key, value) = cookie.trim().split_once('=')?;
            (key.trim() == name).then(|| value.trim().to_string())
        })
}
