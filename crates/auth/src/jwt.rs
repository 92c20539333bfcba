//! Token decoding and signature verification (HS256).

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error)]
pub enum TokenError {
    /// The token could not be decoded or its signature did not verify.
    #[error("token rejected: {0}")]
    Decode(String),

    /// The token decoded fine but its claims are outside their time window.
    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Verifies a bearer token and yields its claims.
///
/// Trait seam so the HTTP layer can be tested with a stub verifier and so the
/// signing scheme can change without touching the middleware.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError>;
}

/// HS256 shared-secret validator, the scheme the deployment uses today.
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `validate_claims` does the window checks; no leeway on top of them.
        validation.leeway = 0;
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str) -> Result<JwtClaims, TokenError> {
        let data = decode::<JwtClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Claims(TokenValidationError::Expired),
                ErrorKind::ImmatureSignature => {
                    TokenError::Claims(TokenValidationError::NotYetValid)
                }
                _ => TokenError::Decode(e.to_string()),
            }
        })?;
        validate_claims(&data.claims, Utc::now())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use conveyor_core::TenantId;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn mint(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let claims = JwtClaims::issue(
            PrincipalId::new(),
            TenantId::new(),
            vec![Role::new("admin")],
            Utc::now(),
            Duration::hours(1),
        );
        let token = mint("topsecret", &claims);

        let validator = Hs256JwtValidator::new("topsecret");
        let decoded = validator.validate(&token).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.tenant_id, claims.tenant_id);
        assert_eq!(decoded.roles, claims.roles);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = JwtClaims::issue(
            PrincipalId::new(),
            TenantId::new(),
            vec![],
            Utc::now(),
            Duration::hours(1),
        );
        let token = mint("topsecret", &claims);

        let validator = Hs256JwtValidator::new("other-secret");
        assert!(matches!(
            validator.validate(&token),
            Err(TokenError::Decode(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtClaims::issue(
            PrincipalId::new(),
            TenantId::new(),
            vec![],
            Utc::now() - Duration::hours(2),
            Duration::hours(1),
        );
        let token = mint("topsecret", &claims);

        let validator = Hs256JwtValidator::new("topsecret");
        assert!(matches!(
            validator.validate(&token),
            Err(TokenError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let validator = Hs256JwtValidator::new("topsecret");
        assert!(matches!(
            validator.validate("not.a.jwt"),
            Err(TokenError::Decode(_))
        ));
    }
}
