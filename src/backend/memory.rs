use super::{BackendError, ShareBackend, ShareDescriptor, ShareResolution};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

struct StaticShare {
    descriptor: ShareDescriptor,
    password: Option<String>,
}

/// A backend holding a fixed set of shares in memory. Every resolution
/// request is recorded so callers can inspect which password was presented.
pub struct StaticShareBackend {
    shares: RwLock<HashMap<String, StaticShare>>,
    accessible: AtomicBool,
    requests: RwLock<Vec<(String, Option<String>)>>,
}

impl StaticShareBackend {
    pub fn new() -> Self {
        Self {
            shares: RwLock::new(HashMap::new()),
            accessible: AtomicBool::new(true),
            requests: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_share(&self, descriptor: ShareDescriptor, password: Option<&str>) {
        let share = StaticShare {
            password: password.map(str::to_string),
            descriptor,
        };
        self.shares
            .write()
            .await
            .insert(share.descriptor.key.clone(), share);
    }

    pub async fn remove_share(&self, key: &str) -> bool {
        self.shares.write().await.remove(key).is_some()
    }

    pub fn set_accessible(&self, accessible: bool) {
        self.accessible.store(accessible, Ordering::SeqCst);
    }

    /// `(key, password)` for every `resolve_share` call so far.
    pub async fn requests(&self) -> Vec<(String, Option<String>)> {
        self.requests.read().await.clone()
    }
}

impl Default for StaticShareBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShareBackend for StaticShareBackend {
    async fn accessible(&self) -> bool {
        self.accessible.load(Ordering::SeqCst)
    }

    async fn resolve_share(
        &self,
        key: &str,
        password: Option<&str>,
    ) -> Result<ShareResolution, BackendError> {
        self.requests
            .write()
            .await
            .push((key.to_string(), password.map(str::to_string)));

        let shares = self.shares.read().await;
        let Some(share) = shares.get(key) else {
            debug!("Static backend has no share {}", key);
            return Ok(ShareResolution::NotFound);
        };

        match share.password.as_deref() {
            Some(expected) if password != Some(expected) => Ok(ShareResolution::PasswordRequired),
            _ => Ok(ShareResolution::Found(share.descriptor.clone())),
        }
    }

    fn name(&self) -> &str {
        "Static (in-memory)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Asset, AssetKind};

    fn share(key: &str) -> ShareDescriptor {
        ShareDescriptor::new(key, vec![Asset::new("a", AssetKind::Image)])
    }

    #[tokio::test]
    async fn test_unknown_key_not_found() {
        let backend = StaticShareBackend::new();
        let result = backend.resolve_share("nope", None).await.unwrap();
        assert_eq!(result, ShareResolution::NotFound);
    }

    #[tokio::test]
    async fn test_password_protected_share() {
        let backend = StaticShareBackend::new();
        backend.add_share(share("locked"), Some("secret")).await;

        assert_eq!(
            backend.resolve_share("locked", None).await.unwrap(),
            ShareResolution::PasswordRequired
        );
        assert_eq!(
            backend.resolve_share("locked", Some("wrong")).await.unwrap(),
            ShareResolution::PasswordRequired
        );
        assert_eq!(
            backend.resolve_share("locked", Some("secret")).await.unwrap(),
            ShareResolution::Found(share("locked"))
        );
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let backend = StaticShareBackend::new();
        backend.add_share(share("open"), None).await;
        backend.resolve_share("open", Some("pw")).await.unwrap();
        backend.resolve_share("other", None).await.unwrap();

        assert_eq!(
            backend.requests().await,
            vec![
                ("open".to_string(), Some("pw".to_string())),
                ("other".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_removed_share_is_not_found() {
        let backend = StaticShareBackend::new();
        backend.add_share(share("gone"), None).await;
        assert!(backend.remove_share("gone").await);
        assert!(!backend.remove_share("gone").await);
        assert_eq!(
            backend.resolve_share("gone", None).await.unwrap(),
            ShareResolution::NotFound
        );
    }

    #[tokio::test]
    async fn test_accessibility_toggle() {
        let backend = StaticShareBackend::new();
        assert!(backend.accessible().await);
        backend.set_accessible(false);
        assert!(!backend.accessible().await);
    }
}
