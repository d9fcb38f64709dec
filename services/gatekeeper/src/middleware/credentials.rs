//! Basic credential extraction and the verification boundary.
//!
//! # Security considerations
//! - The secret is never logged and is redacted from `Debug` output.
//! - [`UnverifiedSecret`] accepts any secret. Deployments that do not
//!   authenticate upstream must supply a real [`CredentialVerifier`].
use async_trait::async_trait;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

const BASIC_PREFIX: &str = "Basic ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("missing basic authorization header")]
    Missing,
    #[error("credentials are not valid base64")]
    Encoding,
    #[error("credentials are not in identity:secret form")]
    Malformed,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub identity: String,
    secret: String,
}

impl BasicCredentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Parse `Authorization: Basic base64(identity:secret)`. The payload is split
/// on the first colon, so secrets may contain colons.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, CredentialError> {
    let encoded = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BASIC_PREFIX))
        .ok_or(CredentialError::Missing)?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| CredentialError::Encoding)?;
    let decoded = String::from_utf8(decoded).map_err(|_| CredentialError::Malformed)?;
    let (identity, secret) = decoded
        .split_once(':')
        .ok_or(CredentialError::Malformed)?;
    Ok(BasicCredentials::new(identity, secret))
}

#[derive(Debug, Error)]
#[error("credential verification failed: {0}")]
pub struct VerifierError(pub String);

/// Decides whether a decoded secret is valid for its identity. Returning
/// `Ok(false)` rejects the request as unauthorized; an error fails it closed
/// as an internal error.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credentials: &BasicCredentials) -> Result<bool, VerifierError>;
}

/// Accepts every secret. Authentication is expected to happen upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnverifiedSecret;

#[async_trait]
impl CredentialVerifier for UnverifiedSecret {
    async fn verify(&self, _credentials: &BasicCredentials) -> Result<bool, VerifierError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn decodes_identity_and_secret() {
        let encoded = STANDARD.encode("alice:secret");
        let creds = extract_basic_credentials(&headers_with(&format!("Basic {encoded}")))
            .expect("credentials");
        assert_eq!(creds.identity, "alice");
        assert_eq!(creds.secret(), "secret");
    }

    #[test]
    fn splits_on_first_colon_only() {
        let encoded = STANDARD.encode("alice:pa:ss");
        let creds = extract_basic_credentials(&headers_with(&format!("Basic {encoded}")))
            .expect("credentials");
        assert_eq!(creds.identity, "alice");
        assert_eq!(creds.secret(), "pa:ss");
    }

    #[test]
    fn rejects_missing_and_non_basic_headers() {
        assert_eq!(
            extract_basic_credentials(&HeaderMap::new()).unwrap_err(),
            CredentialError::Missing
        );
        assert_eq!(
            extract_basic_credentials(&headers_with("Bearer abc")).unwrap_err(),
            CredentialError::Missing
        );
    }

    #[test]
    fn rejects_bad_encoding_and_missing_colon() {
        assert_eq!(
            extract_basic_credentials(&headers_with("Basic !!!")).unwrap_err(),
            CredentialError::Encoding
        );
        let encoded = STANDARD.encode("alice");
        assert_eq!(
            extract_basic_credentials(&headers_with(&format!("Basic {encoded}"))).unwrap_err(),
            CredentialError::Malformed
        );
    }

    #[test]
    fn debug_output_redacts_secret() {
        let rendered = format!("{:?}", BasicCredentials::new("alice", "hunter2"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn unverified_secret_accepts_everything() {
        let creds = BasicCredentials::new("alice", "");
        assert!(UnverifiedSecret.verify(&creds).await.expect("verify"));
    }
}
