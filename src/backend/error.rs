use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {0} from backend")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}
