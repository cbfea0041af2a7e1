pub mod proxy;

use crate::backend::{ResolvedAsset, SizeVariant};
use async_trait::async_trait;
use axum::{http::HeaderValue, response::Response};
use std::sync::Arc;

#[async_trait]
pub trait MediaStreamer: Send + Sync {
    /// Streams the bytes of `asset` at the requested size. Implementations
    /// set the status (200, or 206 for a satisfied `Range`) and the content
    /// headers themselves. Dropping the returned body stops the transfer.
    async fn stream(
        &self,
        asset: ResolvedAsset<'_>,
        size: SizeVariant,
        range: Option<&HeaderValue>,
    ) -> Response;

    fn name(&self) -> &str;
}

pub type DynMediaStreamer = Arc<dyn MediaStreamer>;
