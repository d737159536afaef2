use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload. Identity fields mirror the user view at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Identity carried into a token.
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
}

impl From<&Claims> for TokenSubject {
    fn from(c: &Claims) -> Self {
        Self { user_id: c.user_id.clone(), name: c.name.clone(), email: c.email.clone(), status: c.status.clone() }
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(cfg: &configs::AuthConfig) -> Self {
        Self::new(
            &cfg.jwt_secret,
            Duration::minutes(cfg.access_token_expire_minutes),
            Duration::days(cfg.refresh_token_expire_days),
        )
    }

    pub fn issue(&self, subject: &TokenSubject, kind: TokenKind) -> Result<String, ServiceError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let now = Utc::now();
        let claims = Claims {
            user_id: subject.user_id.clone(),
            name: subject.name.clone(),
            email: subject.email.clone(),
            status: subject.status.clone(),
            token_type: kind,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        self.encode_claims(&claims)
    }

    pub fn issue_pair(&self, subject: &TokenSubject) -> Result<TokenPair, ServiceError> {
        Ok(TokenPair {
            access_token: self.issue(subject, TokenKind::Access)?,
            refresh_token: self.issue(subject, TokenKind::Refresh)?,
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| ServiceError::Token(e.to_string()))
    }

    /// Verify signature and expiry, then require the expected token kind.
    pub fn decode(&self, token: &str, expected: TokenKind) -> Result<Claims, ServiceError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| ServiceError::Token(e.to_string()))?;
        if data.claims.token_type != expected {
            return Err(ServiceError::Token(format!("expected {expected:?} token")));
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> JwtKeys {
        JwtKeys::new("unit-secret", Duration::minutes(30), Duration::days(7))
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            user_id: "7d3c5f0e-0000-4000-8000-000000000001".into(),
            name: Some("Ann".into()),
            email: Some("ann@example.com".into()),
            status: Some("active".into()),
        }
    }

    #[test]
    fn access_token_round_trip() {
        let k = keys();
        let token = k.issue(&subject(), TokenKind::Access).unwrap();
        let claims = k.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.email.as_deref(), Some("ann@example.com"));
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let k = keys();
        let pair = k.issue_pair(&subject()).unwrap();
        assert!(k.decode(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(k.decode(&pair.access_token, TokenKind::Refresh).is_err());
        assert!(k.decode(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn expired_and_foreign_tokens_fail() {
        let k = keys();
        let now = Utc::now().timestamp();
        let stale = Claims {
            user_id: "u".into(),
            name: None,
            email: None,
            status: None,
            token_type: TokenKind::Access,
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = k.encode_claims(&stale).unwrap();
        assert!(k.decode(&token, TokenKind::Access).is_err());

        let other = JwtKeys::new("other-secret", Duration::minutes(5), Duration::days(1));
        let foreign = other.issue(&subject(), TokenKind::Access).unwrap();
        assert!(k.decode(&foreign, TokenKind::Access).is_err());
        assert!(k.decode("not.a.jwt", TokenKind::Access).is_err());
    }
}
