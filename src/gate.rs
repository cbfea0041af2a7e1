use crate::AppState;
use crate::cipher::{CipherError, EncryptedPair, SessionCipher};
use crate::session::SessionStore;
use axum::{
    extract::{RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Longest credential lifetime the gateway will issue: one year.
pub const MAX_CREDENTIAL_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Credential lifetime of {0} seconds is out of range")]
    TtlOutOfRange(i64),

    #[error("Failed to serialize credential: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to encrypt credential: {0}")]
    Cipher(#[from] CipherError),
}

/// Plaintext of an unlock credential. `expires` is a Unix timestamp in
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub password: String,
    pub expires: i64,
}

impl SessionCredential {
    /// Issues a credential valid for `ttl_seconds` from `now`.
    pub fn new(
        password: impl Into<String>,
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Result<Self, CredentialError> {
        let expires = Duration::try_seconds(ttl_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(CredentialError::TtlOutOfRange(ttl_seconds))?;

        Ok(Self {
            password: password.into(),
            expires: expires.timestamp_millis(),
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires > now.timestamp_millis()
    }

    pub fn seal(&self, cipher: &SessionCipher) -> Result<EncryptedPair, CredentialError> {
        let json = serde_json::to_string(self)?;
        Ok(cipher.encrypt(&json)?)
    }
}

/// Outcome of looking for a usable credential. Decode failures of any kind
/// collapse into `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Valid(String),
    Absent,
}

impl Credential {
    pub fn into_password(self) -> Option<String> {
        match self {
            Credential::Valid(password) => Some(password),
            Credential::Absent => None,
        }
    }
}

pub fn recover_password(
    store: &SessionStore,
    share_key: &str,
    cipher: &SessionCipher,
    now: DateTime<Utc>,
) -> Credential {
    let Some(pair) = store.get(share_key) else {
        return Credential::Absent;
    };

    let plaintext = match cipher.decrypt(pair) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            debug!("Ignoring undecryptable credential for {}: {}", share_key, e);
            return Credential::Absent;
        }
    };

    match serde_json::from_str::<SessionCredential>(&plaintext) {
        Ok(credential) if credential.is_valid_at(now) => Credential::Valid(credential.password),
        Ok(_) => {
            debug!("Credential for {} has expired", share_key);
            Credential::Absent
        }
        Err(e) => {
            debug!("Ignoring malformed credential for {}: {}", share_key, e);
            Credential::Absent
        }
    }
}

/// Password recovered for the share in the current route, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharePassword(pub Option<String>);

/// Attaches the caller's stored password for the routed share key to the
/// request. Never rejects a request.
pub async fn password_gate(
    State(app_state): State<AppState>,
    session: SessionStore,
    params: RawPathParams,
    mut request: Request,
    next: Next,
) -> Response {
    let password = params
        .iter()
        .find(|(name, _)| *name == "key")
        .map(|(_, key)| recover_password(&session, key, &app_state.cipher, Utc::now()))
        .and_then(Credential::into_password);

    request.extensions_mut().insert(SharePassword(password));
    next.run(request).await
}
