// Backend client - resolves share keys against the photo server
mod error;
pub mod immich;
pub mod memory;
mod types;

pub use error::BackendError;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait ShareBackend: Send + Sync {
    /// Liveness probe against the photo server.
    async fn accessible(&self) -> bool;

    /// Fetches the current state of a share. Nothing is cached between calls
    /// since lock state and passwords can change at any time.
    async fn resolve_share(
        &self,
        key: &str,
        password: Option<&str>,
    ) -> Result<ShareResolution, BackendError>;

    fn name(&self) -> &str;
}

pub type DynShareBackend = Arc<dyn ShareBackend>;

/// Share keys are URL-safe tokens: letters, digits, `_` and `-`.
pub fn is_key(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Asset ids are UUIDs.
pub fn is_id(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}
