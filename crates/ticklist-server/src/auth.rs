use std::sync::Arc;

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::AppError;

/// Identity attached to a request after token verification.
///
/// Account provisioning and token issuance happen outside this service;
/// by the time a request reaches a handler the username is trusted.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &Arc<AppConfig>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.auth_clock_skew.as_secs();
        validation.validate_nbf = true;
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let decoded = decode::<Claims>(token, &self.key, &self.validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {error}"))
        })?;

        let username = decoded.claims.sub.trim().to_string();
        if username.is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }

        Ok(AuthenticatedUser { username })
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

/// Stable hash of a username for log lines, so logs never carry the raw name
pub fn user_fingerprint(username: &str) -> u64 {
    use std::hash::{Hash, Hasher};

    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    username.hash(&mut hasher);
    hasher.finish()
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        nbf: Option<i64>,
    }

    fn test_config(secret: &str) -> Arc<AppConfig> {
        Arc::new(AppConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            db_path: ":memory:".to_string(),
            jwt_secret: secret.to_string(),
            auth_clock_skew: std::time::Duration::from_secs(60),
            scan_interval: std::time::Duration::from_secs(60),
            reminder_window: std::time::Duration::from_secs(60),
            push_timeout: std::time::Duration::from_secs(10),
            push_ttl_secs: 60,
        })
    }

    fn issue(secret: &str, sub: &str, exp_offset_secs: i64) -> String {
        issue_with_nbf(secret, sub, exp_offset_secs, None)
    }

    fn issue_with_nbf(
        secret: &str,
        sub: &str,
        exp_offset_secs: i64,
        nbf_offset_secs: Option<i64>,
    ) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = TestClaims {
            sub: sub.to_string(),
            exp: now + exp_offset_secs,
            nbf: nbf_offset_secs.map(|offset| now + offset),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = TokenVerifier::new(&test_config("secret"));
        let user = verifier.verify(&issue("secret", "alice", 3_600)).unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let verifier = TokenVerifier::new(&test_config("secret"));
        // Past the configured 60s leeway.
        let err = verifier.verify(&issue("secret", "alice", -3_600)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_verify_rejects_premature_token() {
        let verifier = TokenVerifier::new(&test_config("secret"));
        // Not valid for another hour, well past the 60s leeway.
        let err = verifier
            .verify(&issue_with_nbf("secret", "alice", 7_200, Some(3_600)))
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        // An nbf within the configured clock skew is tolerated.
        let user = verifier
            .verify(&issue_with_nbf("secret", "alice", 3_600, Some(30)))
            .unwrap();
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let verifier = TokenVerifier::new(&test_config("secret"));
        let err = verifier.verify(&issue("other", "alice", 3_600)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_verify_rejects_blank_subject() {
        let verifier = TokenVerifier::new(&test_config("secret"));
        let err = verifier.verify(&issue("secret", "  ", 3_600)).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_user_fingerprint_is_stable_per_user() {
        assert_eq!(user_fingerprint("alice"), user_fingerprint("alice"));
        assert_ne!(user_fingerprint("alice"), user_fingerprint("bob"));
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer abc123".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc123");

        headers.insert("authorization", "Basic abc123".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(extract_bearer_token(&headers).is_err());
    }
}
