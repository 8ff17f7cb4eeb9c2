//! Bearer token issuance.
//!
//! Tokens are HS256 JWTs whose subject is the user's email. No route checks
//! them; clients present them to other services.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use maxima_core::Email;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (login email)
    pub sub: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiration, seconds since the epoch
    pub exp: i64,
}

/// Signs and verifies bearer tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl", &self.ttl)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Issue a token for `email`, valid from `now` for the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error if signing fails.
    pub fn issue(
        &self,
        email: &Email,
        now: DateTime<Utc>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: email.as_str().to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Decode a token, checking its signature and expiry against the clock.
    ///
    /// # Errors
    ///
    /// Returns the `jsonwebtoken` error for a bad signature, a malformed
    /// token or an expired one.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation).map(|data| data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use jsonwebtoken::errors::ErrorKind;

    use super::*;

    fn issuer(secret: &str) -> TokenIssuer {
        TokenIssuer::new(&SecretString::from(secret.to_owned()), Duration::hours(1))
    }

    fn email() -> Email {
        Email::parse("cliente@maximacarga.es").unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer("k7Qz!pL2#vX9@mN4$rT6^wY8&bH1*cJ3");
        let now = Utc::now();
        let token = issuer.issue(&email(), now).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "cliente@maximacarga.es");
        assert_eq!(claims.iat, now.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer("k7Qz!pL2#vX9@mN4$rT6^wY8&bH1*cJ3");
        let token = issuer
            .issue(&email(), Utc::now() - Duration::hours(3))
            .unwrap();

        let err = issuer.verify(&token).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExpiredSignature));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = issuer("k7Qz!pL2#vX9@mN4$rT6^wY8&bH1*cJ3")
            .issue(&email(), Utc::now())
            .unwrap();

        let err = issuer("a-completely-different-signing-key!!")
            .verify(&token)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidSignature));
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", issuer("k7Qz!pL2#vX9@mN4$rT6^wY8&bH1*cJ3"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("k7Qz"));
    }
}
