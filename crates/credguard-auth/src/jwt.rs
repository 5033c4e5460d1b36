//! Session tokens (HS256 JWT)
//!
//! Tokens are stateless: nothing is stored server-side, and verification
//! recomputes validity from the signature and the embedded expiry.
//! Rotating the signing secret invalidates every outstanding token.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Issuer stamped into every session token
pub const SESSION_ISSUER: &str = "credguard";

/// JWT claims for a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    /// Subject (the credential's email)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl SessionClaims {
    /// Fails with `InvalidValidity` if the expiry is not representable
    pub fn new(
        identity: String,
        issued_at: DateTime<Utc>,
        validity: Duration,
    ) -> Result<Self, SessionError> {
        let exp = issued_at
            .checked_add_signed(validity)
            .ok_or(SessionError::InvalidValidity)?;

        Ok(Self {
            sub: identity,
            iat: issued_at.timestamp(),
            exp: exp.timestamp(),
            iss: SESSION_ISSUER.to_string(),
        })
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }

    pub fn exp_formatted(&self) -> String {
        use chrono::Local;
        let local: DateTime<Local> = self.expires_at().into();
        local.format("%Y-%m-%d %H:%M:%S %Z").to_string()
    }
}

/// Session token errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Signing secret must not be empty")]
    EmptySecret,

    #[error("Token validity must be positive and representable")]
    InvalidValidity,

    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Malformed token")]
    Malformed,
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => SessionError::InvalidSignature,
            ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::Malformed,
        }
    }
}

/// Issues and verifies session tokens with a process-wide secret
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
}

impl SessionTokens {
    /// Create an issuer/verifier using HMAC-SHA256
    ///
    /// Validates:
    /// - Signature verification (using the secret)
    /// - Token expiration (no leeway)
    /// - Issuer (`SESSION_ISSUER`)
    pub fn new(secret: &[u8], validity: Duration) -> Result<Self, SessionError> {
        if secret.is_empty() {
            return Err(SessionError::EmptySecret);
        }
        if validity <= Duration::zero() || Utc::now().checked_add_signed(validity).is_none() {
            return Err(SessionError::InvalidValidity);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_issuer(&[SESSION_ISSUER]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            validity,
        })
    }

    /// Issue a token for `identity`, valid from now
    pub fn issue(&self, identity: &str) -> Result<String, SessionError> {
        self.issue_at(identity, Utc::now())
    }

    /// Issue a token as if it had been issued at `issued_at`
    pub fn issue_at(
        &self,
        identity: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, SessionError> {
        let claims = SessionClaims::new(identity.to_string(), issued_at, self.validity)?;
        self.encode(&claims)
    }

    fn encode(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key).map_err(SessionError::Signing)
    }

    /// Verify a token and return its identity
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        self.verify_claims(token).map(|claims| claims.sub)
    }

    /// Verify a token and return all of its claims
    ///
    /// The signature is checked before the expiry, so a tampered token
    /// reports `InvalidSignature` even when it is also expired.
    pub fn verify_claims(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?;

        if token_data.claims.is_expired() {
            return Err(SessionError::Expired);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test_secret_key_1234567890";

    fn tokens() -> SessionTokens {
        SessionTokens::new(TEST_SECRET, Duration::hours(1)).unwrap()
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = tokens();
        let token = tokens.issue("exampleEmail").unwrap();

        assert_eq!(tokens.verify(&token).unwrap(), "exampleEmail");
    }

    #[test]
    fn test_claims_carry_issue_and_expiry() {
        let tokens = tokens();
        let issued_at = Utc::now();
        let token = tokens.issue_at("exampleEmail", issued_at).unwrap();

        let claims = tokens.verify_claims(&token).unwrap();
        assert_eq!(claims.sub, "exampleEmail");
        assert_eq!(claims.iss, SESSION_ISSUER);
        assert_eq!(claims.iat, issued_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_looks_like_jwt() {
        let token = tokens().issue("exampleEmail").unwrap();
        assert!(token.starts_with("eyJ"));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_expired_token() {
        let tokens = tokens();
        let long_ago = Utc::now() - Duration::hours(1) - Duration::seconds(10);
        let token = tokens.issue_at("exampleEmail", long_ago).unwrap();

        assert!(matches!(tokens.verify(&token), Err(SessionError::Expired)));
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let token = tokens().issue("exampleEmail").unwrap();

        let rotated = SessionTokens::new(b"another_secret_entirely", Duration::hours(1)).unwrap();
        assert!(matches!(
            rotated.verify(&token),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_signature() {
        let tokens = tokens();
        let token = tokens.issue("exampleEmail").unwrap();

        let (unsigned, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{}.{}", unsigned, chars.into_iter().collect::<String>());

        assert!(matches!(
            tokens.verify(&tampered),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_payload() {
        let tokens = tokens();
        let victim = tokens.issue("victim@example.com").unwrap();
        let attacker = tokens.issue("attacker@example.com").unwrap();

        // Attacker's claims under the victim's signature
        let victim_parts: Vec<&str> = victim.split('.').collect();
        let attacker_parts: Vec<&str> = attacker.split('.').collect();
        let forged = format!(
            "{}.{}.{}",
            victim_parts[0], attacker_parts[1], victim_parts[2]
        );

        assert!(matches!(
            tokens.verify(&forged),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_tampered_and_expired_reports_signature() {
        let tokens = tokens();
        let long_ago = Utc::now() - Duration::days(2);
        let token = tokens.issue_at("exampleEmail", long_ago).unwrap();

        let other = SessionTokens::new(b"another_secret_entirely", Duration::hours(1)).unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let tokens = tokens();
        for garbage in ["", "not-a-token", "a.b.c", "....."] {
            assert!(
                matches!(tokens.verify(garbage), Err(SessionError::Malformed)),
                "{:?} should be malformed",
                garbage
            );
        }
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            SessionTokens::new(b"", Duration::hours(1)),
            Err(SessionError::EmptySecret)
        ));
    }

    #[test]
    fn test_non_positive_validity_rejected() {
        assert!(matches!(
            SessionTokens::new(TEST_SECRET, Duration::zero()),
            Err(SessionError::InvalidValidity)
        ));
    }

    #[test]
    fn test_unrepresentable_validity_rejected() {
        assert!(matches!(
            SessionTokens::new(TEST_SECRET, Duration::hours(1_000_000_000_000)),
            Err(SessionError::InvalidValidity)
        ));
    }

    #[test]
    fn test_issue_at_overflow_is_an_error() {
        let tokens = tokens();
        let result = tokens.issue_at("exampleEmail", DateTime::<Utc>::MAX_UTC);

        assert!(matches!(result, Err(SessionError::InvalidValidity)));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let tokens = tokens();
        let mut claims =
            SessionClaims::new("exampleEmail".to_string(), Utc::now(), Duration::hours(1)).unwrap();
        claims.iss = "someone-else".to_string();
        let token = tokens.encode(&claims).unwrap();

        assert!(matches!(tokens.verify(&token), Err(SessionError::Malformed)));
    }

    #[test]
    fn test_claims_serialization_shape() {
        let claims =
            SessionClaims::new("exampleEmail".to_string(), Utc::now(), Duration::hours(1)).unwrap();
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["sub"], "exampleEmail");
        assert_eq!(json["iss"], "credguard");
        assert!(json.get("iat").is_some());
        assert!(json.get("exp").is_some());
    }
}
