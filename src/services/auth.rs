//! Bearer token verification for HTTP routes and the realtime socket.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;
use crate::models::UserAccount;
use crate::services::accounts::AccountDirectory;
use crate::services::postgres::PostgresError;

/// Cookie names checked, in order, when no header or query token is present
pub const TOKEN_COOKIES: [&str; 3] = ["accessToken", "access_token", "pm_access"];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("User not found")]
    UnknownUser,

    #[error("Account is inactive or blocked")]
    AccountDisabled,

    #[error("Admin privileges required")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] PostgresError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId", alias = "sub")]
    pub user_id: String,
    pub exp: usize,
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,
}

/// HS256 signer and verifier
#[derive(Clone)]
pub struct JwtVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }
}

/// Token verification plus account checks
#[derive(Clone)]
pub struct AuthService {
    verifier: JwtVerifier,
    accounts: AccountDirectory,
}

impl AuthService {
    pub fn new(verifier: JwtVerifier, accounts: AccountDirectory) -> Self {
        Self { verifier, accounts }
    }

    pub fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.verifier.verify(token)?;
        let account = self
            .accounts
            .get(&claims.user_id)
            .await?
            .ok_or(AuthError::UnknownUser)?;

        if !account.can_connect() {
            tracing::info!(user_id = %claims.user_id, "Rejected disabled account");
            return Err(AuthError::AccountDisabled);
        }

        Ok(AuthenticatedUser {
            user_id: claims.user_id,
            is_admin: claims.is_admin,
            account,
        })
    }
}

/// Caller of an authenticated route
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub is_admin: bool,
    pub account: UserAccount,
}

impl AuthenticatedUser {
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AuthError::Forbidden)
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let auth = req.app_data::<web::Data<AuthService>>().cloned();
        let token = extract_token(req);

        Box::pin(async move {
            let auth = auth.ok_or_else(|| ApiError::internal("authentication is not configured"))?;
            let token = token.ok_or(AuthError::MissingToken)?;
            Ok(auth.authenticate(&token).await?)
        })
    }
}

/// Token from the `Authorization` header, the `token` query parameter or one
/// of the session cookies, in that order
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    let header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    token_from_parts(header, req.query_string(), |name| {
        req.cookie(name).map(|c| c.value().to_string())
    })
}

fn token_from_parts<F>(authorization: Option<&str>, query: &str, cookie: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let bearer = authorization
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    let from_query = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .and_then(|(_, value)| decode_component(value));
    if from_query.is_some() {
        return from_query;
    }

    TOKEN_COOKIES
        .iter()
        .filter_map(|name| cookie(name))
        .find_map(|raw| decode_component(&raw))
}

fn decode_component(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?.into_owned();
    let trimmed = decoded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    fn claims(user: &str, exp_offset: i64) -> Claims {
        Claims {
            user_id: user.to_string(),
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
            is_admin: false,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let verifier = JwtVerifier::new("secret", 0);
        let token = verifier.sign(&claims("alice", 3600)).unwrap();
        assert_eq!(verifier.verify(&token).unwrap().user_id, "alice");

        let other = JwtVerifier::new("different", 0);
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new("secret", 0);
        let token = verifier.sign(&claims("alice", -120)).unwrap();
        assert!(matches!(verifier.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_header_wins() {
        let req = TestRequest::default()
            .uri("/ws?token=from-query")
            .insert_header(("Authorization", "Bearer from-header"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_query_token() {
        let req = TestRequest::default().uri("/ws?x=1&token=abc%2Edef").to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_cookie_order_and_decoding() {
        let req = TestRequest::default()
            .cookie(Cookie::new("pm_access", "third"))
            .cookie(Cookie::new("access_token", "second%2Dtoken"))
            .to_http_request();
        assert_eq!(extract_token(&req).as_deref(), Some("second-token"));
    }

    #[test]
    fn test_missing_token() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic xyz"))
            .to_http_request();
        assert!(extract_token(&req).is_none());
    }
}
