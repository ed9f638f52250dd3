// src/utils/jwt.rs

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::AppError, services::auth, state::AppState};

/// Distinguishes short-lived access tokens from revocable refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject - the user id (UUID string).
    pub sub: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Random token id, makes two tokens issued in the same second distinct.
    pub jti: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiration, Unix seconds.
    pub exp: i64,
}

/// The authenticated caller, injected into request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
}

fn sign(
    user_id: Uuid,
    token_type: TokenType,
    expires_at: DateTime<Utc>,
    secret: &str,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id.to_string(),
        token_type,
        jti: Uuid::new_v4().simple().to_string(),
        iat: Utc::now().timestamp(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Signs a stateless access token valid for `ttl_minutes`.
pub fn issue_access_token(user_id: Uuid, ttl_minutes: i64, secret: &str) -> Result<String, AppError> {
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);
    sign(user_id, TokenType::Access, expires_at, secret)
}

/// Signs a refresh token valid for `ttl_days`.
///
/// Returns the raw token together with its expiry. The caller persists only
/// `hash_token(token)` and the returned expiry, never the raw token.
pub fn issue_refresh_token(
    user_id: Uuid,
    ttl_days: i64,
    secret: &str,
) -> Result<(String, DateTime<Utc>), AppError> {
    let expires_at = Utc::now() + Duration::days(ttl_days);
    let token = sign(user_id, TokenType::Refresh, expires_at, secret)?;
    Ok((token, expires_at))
}

/// Verifies signature and expiry and returns the claims.
///
/// Bad signature, malformed structure and expiry all produce the same error.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthenticated("Invalid token".to_string()))?;

    Ok(token_data.claims)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum Middleware: Authentication.
///
/// Validates the bearer access token, then resolves its subject to a user row.
/// The token is checked before a database connection is taken.
/// On success injects `CurrentUser` into the request extensions; otherwise 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| AppError::Unauthenticated("Not authenticated".to_string()))?
        .to_owned();

    let user_id = auth::access_subject(&token, &state.config.jwt_secret)?;

    let user = {
        let mut conn = state.pool.acquire().await?;
        auth::load_principal(&mut conn, user_id).await?
    };

    req.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit_test_secret";

    #[test]
    fn access_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_access_token(user_id, 30, SECRET).unwrap();

        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.exp > claims.iat);
        assert_eq!(claims.jti.len(), 32);
    }

    #[test]
    fn refresh_token_carries_type_and_expiry() {
        let user_id = Uuid::new_v4();
        let (token, expires_at) = issue_refresh_token(user_id, 30, SECRET).unwrap();

        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(expires_at > Utc::now() + Duration::days(29));
    }

    #[test]
    fn tokens_issued_together_differ() {
        let user_id = Uuid::new_v4();
        let a = issue_access_token(user_id, 30, SECRET).unwrap();
        let b = issue_access_token(user_id, 30, SECRET).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_access_token(Uuid::new_v4(), -1, SECRET).unwrap();
        let err = decode_token(&token, SECRET).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }

    #[test]
    fn wrong_secret_and_garbage_fail_identically() {
        let token = issue_access_token(Uuid::new_v4(), 30, SECRET).unwrap();

        let wrong_key = decode_token(&token, "another_secret").unwrap_err();
        let garbage = decode_token("not.a.jwt", SECRET).unwrap_err();

        assert_eq!(wrong_key.to_string(), garbage.to_string());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let token = issue_access_token(Uuid::new_v4(), 30, SECRET).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let other = issue_access_token(Uuid::new_v4(), 30, SECRET).unwrap();
        parts[1] = other.split('.').nth(1).unwrap().to_string();

        assert!(decode_token(&parts.join("."), SECRET).is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }
}
