use crate::Config;
use crate::backend::{ShareBackend, immich::ImmichBackend};
use crate::gate::MAX_CREDENTIAL_TTL_SECONDS;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Backend URL is invalid: {0}")]
    InvalidBackendUrl(String),

    #[error("Public base URL is invalid: {0}")]
    InvalidPublicBaseUrl(String),

    #[error("Backend is not reachable at {0}")]
    BackendUnreachable(String),

    #[error("Credential lifetime must be between 1 and 31536000 seconds, got {0}")]
    InvalidCredentialTtl(i64),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::BackendUnreachable(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    if let Err(e) = Url::parse(&config.app.public_base_url) {
        error!(
            "Public base URL {:?} does not parse: {}",
            config.app.public_base_url, e
        );
        errors.push(StartupCheckError::InvalidPublicBaseUrl(
            config.app.public_base_url.clone(),
        ));
    }

    let ttl_seconds = config.session.credential_ttl_seconds;
    if ttl_seconds <= 0 || ttl_seconds > MAX_CREDENTIAL_TTL_SECONDS {
        error!(
            "Credential lifetime {} seconds is outside 1..={}",
            ttl_seconds, MAX_CREDENTIAL_TTL_SECONDS
        );
        errors.push(StartupCheckError::InvalidCredentialTtl(ttl_seconds));
    }

    match Url::parse(&config.backend.url) {
        Ok(url) => {
            let timeout = Duration::from_secs(config.backend.connect_timeout_seconds);
            match ImmichBackend::new(url, timeout) {
                Ok(backend) if backend.accessible().await => {
                    info!("Backend is reachable at {}", config.backend.url);
                }
                Ok(_) => {
                    warn!(
                        "Backend at {} did not answer the ping, healthchecks will fail until it does",
                        config.backend.url
                    );
                    errors.push(StartupCheckError::BackendUnreachable(
                        config.backend.url.clone(),
                    ));
                }
                Err(e) => {
                    error!("Failed to create backend client: {}", e);
                    errors.push(StartupCheckError::InvalidBackendUrl(
                        config.backend.url.clone(),
                    ));
                }
            }
        }
        Err(e) => {
            error!("Backend URL {:?} does not parse: {}", config.backend.url, e);
            errors.push(StartupCheckError::InvalidBackendUrl(
                config.backend.url.clone(),
            ));
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_urls_are_critical() {
        let mut config = Config::default();
        config.app.public_base_url = "not a url".to_string();
        config.backend.url = "also not a url".to_string();

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert!(errors.iter().all(|e| e.is_critical()));
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, StartupCheckError::InvalidPublicBaseUrl(_)))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, StartupCheckError::InvalidBackendUrl(_)))
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_not_critical() {
        let mut config = Config::default();
        // Port 9 (discard) on loopback refuses connections
        config.backend.url = "http://127.0.0.1:9".to_string();
        config.backend.connect_timeout_seconds = 1;

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StartupCheckError::BackendUnreachable(_)));
        assert!(!errors[0].is_critical());
    }

    #[tokio::test]
    async fn test_credential_ttl_bounds() {
        for ttl_seconds in [0, -5, MAX_CREDENTIAL_TTL_SECONDS + 1, i64::MAX] {
            let mut config = Config::default();
            config.backend.url = "not a url".to_string();
            config.session.credential_ttl_seconds = ttl_seconds;

            let errors = perform_startup_checks(&config).await.unwrap_err();
            assert!(
                errors.iter().any(|e| matches!(
                    e,
                    StartupCheckError::InvalidCredentialTtl(t) if *t == ttl_seconds
                )),
                "{ttl_seconds} should be rejected"
            );
            assert!(errors.iter().all(|e| e.is_critical()));
        }

        let mut config = Config::default();
        config.backend.url = "not a url".to_string();
        config.session.credential_ttl_seconds = MAX_CREDENTIAL_TTL_SECONDS;
        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert!(
            !errors
                .iter()
                .any(|e| matches!(e, StartupCheckError::InvalidCredentialTtl(_)))
        );
    }
}
