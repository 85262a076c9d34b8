use chrono::DateTime;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{CredentialVerifier, IdentityError, Role, VerifiedCredential};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

/// HS256 bearer tokens signed with a shared secret.
pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the injected clock by IdentityContext.
        validation.validate_exp = false;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, claims: &JwtClaims) -> Result<String, IdentityError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|err| IdentityError::InvalidCredential(format!("failed to sign token: {err}")))
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, IdentityError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding, &self.validation)
            .map_err(|err| IdentityError::InvalidCredential(err.to_string()))?;
        let claims = data.claims;

        let role = claims.role.parse::<Role>()?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
            IdentityError::InvalidCredential(format!("exp out of range: {}", claims.exp))
        })?;

        Ok(VerifiedCredential {
            user_id: claims.sub,
            role,
            expires_at,
            name: claims.name,
            email: claims.email,
            phone: claims.phone,
            region: claims.region,
        })
    }
}
