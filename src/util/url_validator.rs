use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BaseUrlError {
    #[error("Invalid base URL: {0}")]
    Invalid(#[from] url::ParseError),
    /// Plain HTTP is only accepted for loopback hosts (local test servers).
    #[error("Insecure base URL {0}: HTTPS required (except localhost)")]
    Insecure(String),
}

/// Validates a configurable remote endpoint.
///
/// HTTPS is required. `http://localhost` and `http://127.0.0.1` are let
/// through with a warning so mock servers can stand in for the real hosts.
/// A trailing slash is removed so callers can append paths directly.
pub fn validate_base_url(base: &str) -> Result<Url, BaseUrlError> {
    let trimmed = base.trim().trim_end_matches('/');
    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "https" => {}
        "http" if matches!(url.host_str(), Some("localhost") | Some("127.0.0.1")) => {
            tracing::warn!(base_url = %trimmed, "Using non-HTTPS base URL (localhost only)");
        }
        _ => {
            tracing::error!(base_url = %trimmed, "Rejecting non-HTTPS base URL");
            return Err(BaseUrlError::Insecure(trimmed.to_string()));
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_base_url("https://www.googleapis.com/youtube/v3/").unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/youtube/v3");
    }

    #[test]
    fn test_localhost_http_accepted() {
        assert!(validate_base_url("http://127.0.0.1:4321").is_ok());
        assert!(validate_base_url("http://localhost:8080").is_ok());
    }

    #[test]
    fn test_remote_http_rejected() {
        assert!(matches!(
            validate_base_url("http://www.youtube.com"),
            Err(BaseUrlError::Insecure(_))
        ));
        assert!(matches!(
            validate_base_url("ftp://127.0.0.1"),
            Err(BaseUrlError::Insecure(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(validate_base_url("not a url"), Err(BaseUrlError::Invalid(_))));
    }
}
