use axum::{
    body::Body,
    http::{Response, StatusCode},
};
use std::any::Any;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Process-wide latch tripped by the first unrecoverable error inside a
/// request handler. The server stops accepting connections once it trips.
#[derive(Clone, Default)]
pub struct FatalLatch {
    token: CancellationToken,
    reason: Arc<Mutex<Option<String>>>,
}

impl FatalLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.reason.lock()
            && slot.is_none()
        {
            *slot = Some(reason.into());
        }
        self.token.cancel();
    }

    pub fn is_tripped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|slot| slot.clone())
    }

    pub async fn tripped(&self) {
        self.token.cancelled().await
    }

    /// Panic handler for `CatchPanicLayer`: logs, trips the latch and answers
    /// with an empty 500.
    pub fn panic_handler(
        &self,
    ) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response<Body> + Clone + Send + Sync + 'static
    {
        let latch = self.clone();
        move |panic: Box<dyn Any + Send + 'static>| {
            let message = if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "unknown panic".to_string()
            };
            error!("Fatal error in request handler: {}", message);
            latch.trip(message);

            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trip_records_first_reason() {
        let latch = FatalLatch::new();
        assert!(!latch.is_tripped());

        latch.trip("first");
        latch.trip("second");

        assert!(latch.is_tripped());
        assert_eq!(latch.reason().as_deref(), Some("first"));
        latch.tripped().await;
    }

    #[test]
    fn test_panic_handler_trips_latch() {
        let latch = FatalLatch::new();
        let handler = latch.panic_handler();
        let response = handler(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(latch.reason().as_deref(), Some("boom"));
    }
}
