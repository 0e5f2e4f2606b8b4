//! Bearer token issuance and verification
//!
//! Tokens are HS256 JWTs signed with a secret shared between the service
//! that issues them and every data node that accepts them.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use strata_common::User;

use crate::error::AuthError;

/// Resolves a bearer token into the user it was issued to
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<User, AuthError>;
}

/// JWT claims carried by a Strata token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username
    pub sub: String,
    pub email: String,
    pub display_name: String,
    pub iat: u64,
    pub exp: u64,
}

/// HS256 token issuer and verifier
pub struct JwtTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl JwtTokens {
    #[must_use]
    pub fn new(secret: &[u8], validity: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            validity,
        }
    }

    /// Issue a token for `user`, valid from now
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .as_secs();
        self.encode(&Claims {
            sub: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            iat: now,
            exp: now + self.validity.as_secs(),
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding,
        )?)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)?.claims)
    }
}

#[async_trait]
impl TokenVerifier for JwtTokens {
    async fn verify(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.decode(token)?;
        Ok(User {
            username: claims.sub,
            email: claims.email,
            display_name: claims.display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let tokens = JwtTokens::new(b"shared-secret", Duration::from_secs(3600));
        let token = tokens.issue(&alice()).unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap(), alice());
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let issuer = JwtTokens::new(b"one", Duration::from_secs(3600));
        let verifier = JwtTokens::new(b"two", Duration::from_secs(3600));
        let token = issuer.issue(&alice()).unwrap();
        assert!(matches!(
            verifier.verify(&token).await,
            Err(AuthError::InvalidToken(_))
        ));
        assert!(verifier.verify("not-a-jwt").await.is_err());
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let tokens = JwtTokens::new(b"shared-secret", Duration::from_secs(3600));
        let token = tokens
            .encode(&Claims {
                sub: "alice".to_string(),
                email: String::new(),
                display_name: String::new(),
                iat: 1_000,
                exp: 2_000,
            })
            .unwrap();
        assert!(matches!(
            tokens.verify(&token).await,
            Err(AuthError::TokenExpired)
        ));
    }
}
