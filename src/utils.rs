use crate::error::UrlError;
use axum::http::StatusCode;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use url::Url;

const GENERATED_PATH_LENGTH: usize = 11;

pub fn internal_error<E>(err: E) -> (StatusCode, String)
where
    E: Error,
{
    tracing::error!("{}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".into(),
    )
}

pub fn error_response(err: UrlError) -> (StatusCode, String) {
    match err {
        UrlError::Validation { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        UrlError::PathConflict => (StatusCode::CONFLICT, err.to_string()),
        _ => internal_error(err),
    }
}

pub async fn with_timeout<F: Future>(
    duration_in_mills: u64,
    task: F,
) -> Result<<F as Future>::Output, (StatusCode, String)> {
    timeout(Duration::from_millis(duration_in_mills), task)
        .await
        .map_err(internal_error)
}

pub fn parse_url(text: &str) -> Result<Url, UrlError> {
    Url::parse(text).map_err(|_| UrlError::validation("endpoint", "Malformed url"))
}

pub fn generate_path() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PATH_LENGTH)
        .map(char::from)
        .collect()
}

pub fn is_valid_path(path: &str) -> bool {
    path.bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_paths_are_valid_and_distinct() {
        let first = generate_path();
        assert_eq!(first.len(), GENERATED_PATH_LENGTH);
        assert!(is_valid_path(&first));
        assert_ne!(first, generate_path());
    }

    #[test]
    fn path_pattern_allows_only_safe_characters() {
        assert!(is_valid_path("demo_Path-42"));
        assert!(!is_valid_path("with space"));
        assert!(!is_valid_path("slash/inside"));
        assert!(!is_valid_path("ümlaut"));
    }

    #[test]
    fn error_response_maps_caller_errors() {
        let (status, message) = error_response(UrlError::PathConflict);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "path must be unique");
        let (status, _) = error_response(UrlError::validation("path", "too long"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, message) = error_response(UrlError::PathExhausted);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
