//! Exchange a pairing code for an access token.

use log::{debug, error, info};
use regex::Regex;
use reqwest::{Method, StatusCode};
use std::sync::OnceLock;

use crate::client::{ApiClient, RequestOptions};
use crate::error::{Error, Result};

pub const REGISTRATION_PATH: &str = "/auth/homebridge/token";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub token: String,
}

fn auth_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]{3}-[0-9]{3}$").expect("valid auth code pattern"))
}

/// Check that `auth_code` looks like `123-456`
pub fn validate_auth_code(auth_code: &str) -> Result<()> {
    if auth_code_pattern().is_match(auth_code) {
        Ok(())
    } else {
        Err(Error::InvalidAuthCodeFormat(auth_code.to_string()))
    }
}

/// Register this client with `auth_code`.
///
/// On success the issued token is written through the client's credential
/// store. The installed authorization header is left untouched.
pub async fn register(client: &ApiClient, auth_code: &str) -> Result<Registration> {
    if let Err(err) = validate_auth_code(auth_code) {
        error!("{}", err);
        return Err(err);
    }

    let body = serde_json::json!({ "authCode": auth_code });

    let response = client
        .request(
            Method::POST,
            REGISTRATION_PATH,
            RequestOptions::default().with_body(body),
        )
        .await;

    let payload = match response {
        Ok(payload) => payload,
        Err(err) if err.status() == Some(StatusCode::NOT_FOUND) => {
            let err = Error::AuthCodeNotFound(auth_code.to_string());
            error!("Registration failed: {}", err);
            return Err(err);
        }
        Err(err) => {
            error!("Registration failed: {}", err);
            return Err(Error::Registration(Box::new(err)));
        }
    };

    match extract_token(&payload) {
        Ok(token) => {
            info!("Registration successful.");
            client.store().set_access_token(&token);
            Ok(Registration { token })
        }
        Err(reason) => {
            error!("Invalid registration response: {}.", reason);
            debug!("{}", payload);
            Err(Error::InvalidResponseShape {
                endpoint: REGISTRATION_PATH.to_string(),
                reason,
                payload,
            })
        }
    }
}

fn extract_token(payload: &str) -> std::result::Result<String, String> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| e.to_string())?;
    match value.get("token").and_then(|token| token.as_str()) {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err("couldn't find token property".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_auth_codes() {
        assert!(validate_auth_code("123-456").is_ok());
        assert!(validate_auth_code("000-000").is_ok());
    }

    #[test]
    fn test_invalid_auth_codes() {
        for code in ["", "123456", "12-3456", "123-45", "abc-def", " 123-456", "123-4567", "x123-456"] {
            assert!(
                matches!(validate_auth_code(code), Err(Error::InvalidAuthCodeFormat(_))),
                "{code:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_extract_token() {
        assert_eq!(extract_token(r#"{"token": "abc"}"#), Ok("abc".to_string()));
        assert!(extract_token(r#"{"token": ""}"#).is_err());
        assert!(extract_token(r#"{"status": "ok"}"#).is_err());
        assert!(extract_token("<html>").is_err());
    }
}
