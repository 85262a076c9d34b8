//! Resolution of bearer credentials into request principals.
//!
//! The verifier only vouches for the token's authenticity and content; expiry
//! is decided here against the injected [`Clock`], so every verifier behaves
//! the same way at the `expires_at <= now` boundary.

pub mod jwt;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;
use crate::models::parcel::ContactKey;

pub use jwt::{JwtClaims, JwtVerifier};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Customer => "CUSTOMER",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = IdentityError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().trim_start_matches("ROLE_").to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            "CUSTOMER" => Ok(Role::Customer),
            _ => Err(IdentityError::InvalidCredential(format!("unknown role: {raw}"))),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential expired")]
    Expired,
}

/// What a verifier extracts from a credential, before expiry is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedCredential {
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
}

pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, IdentityError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Operational scope for staff listings.
    pub region: Option<String>,
}

impl Principal {
    pub fn contact_keys(&self) -> Vec<ContactKey> {
        let mut keys = Vec::with_capacity(2);
        if let Some(email) = self.email.as_deref().and_then(ContactKey::email) {
            keys.push(email);
        }
        if let Some(phone) = self.phone.as_deref().and_then(ContactKey::phone) {
            keys.push(phone);
        }
        keys
    }
}

impl From<VerifiedCredential> for Principal {
    fn from(credential: VerifiedCredential) -> Self {
        Self {
            user_id: credential.user_id,
            role: credential.role,
            expires_at: credential.expires_at,
            name: credential.name,
            email: credential.email,
            phone: credential.phone,
            region: credential.region,
        }
    }
}

#[derive(Clone)]
pub struct IdentityContext {
    verifier: Arc<dyn CredentialVerifier>,
    clock: Arc<dyn Clock>,
}

impl IdentityContext {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, clock: Arc<dyn Clock>) -> Self {
        Self { verifier, clock }
    }

    pub fn resolve(&self, token: &str) -> Result<Principal, IdentityError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(IdentityError::InvalidCredential("empty token".to_string()));
        }

        let credential = self.verifier.verify(token)?;
        if credential.expires_at <= self.clock.now() {
            return Err(IdentityError::Expired);
        }

        Ok(credential.into())
    }

    /// Resolves an `Authorization` header value of the form `Bearer <token>`.
    pub fn resolve_header(&self, header: &str) -> Result<Principal, IdentityError> {
        let (scheme, token) = header.trim().split_once(' ').ok_or_else(|| {
            IdentityError::InvalidCredential("malformed authorization header".to_string())
        })?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(IdentityError::InvalidCredential(format!(
                "unsupported authorization scheme: {scheme}"
            )));
        }

        self.resolve(token)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::{CredentialVerifier, IdentityContext, IdentityError, Role, VerifiedCredential};
    use crate::clock::ManualClock;
    use crate::models::parcel::ContactKey;

    struct StaticVerifier(HashMap<String, VerifiedCredential>);

    impl CredentialVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<VerifiedCredential, IdentityError> {
            self.0
                .get(token)
                .cloned()
                .ok_or_else(|| IdentityError::InvalidCredential("unknown token".to_string()))
        }
    }

    fn setup() -> (IdentityContext, Arc<ManualClock>) {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let credential = VerifiedCredential {
            user_id: "u-1".to_string(),
            role: Role::Customer,
            expires_at: start + Duration::hours(1),
            name: None,
            email: Some("Ann@Example.com".to_string()),
            phone: None,
            region: None,
        };
        let verifier = StaticVerifier(HashMap::from([("tok".to_string(), credential)]));
        (IdentityContext::new(Arc::new(verifier), clock.clone()), clock)
    }

    #[test]
    fn resolves_bearer_header() {
        let (identity, _clock) = setup();
        let principal = identity.resolve_header("Bearer tok").unwrap();
        assert_eq!(principal.user_id, "u-1");
        assert_eq!(principal.role, Role::Customer);
        assert_eq!(
            principal.contact_keys(),
            vec![ContactKey::Email("ann@example.com".to_string())]
        );
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let (identity, clock) = setup();
        clock.advance(Duration::hours(1));
        assert_eq!(identity.resolve("tok"), Err(IdentityError::Expired));
    }

    #[test]
    fn rejects_unknown_scheme_and_token() {
        let (identity, _clock) = setup();
        assert!(matches!(
            identity.resolve_header("Basic tok"),
            Err(IdentityError::InvalidCredential(_))
        ));
        assert!(matches!(
            identity.resolve_header("Bearer nope"),
            Err(IdentityError::InvalidCredential(_))
        ));
        assert!(matches!(
            identity.resolve_header("Bearer"),
            Err(IdentityError::InvalidCredential(_))
        ));
    }

    #[test]
    fn role_parsing_accepts_spring_style_prefix() {
        assert_eq!("ROLE_ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("staff".parse::<Role>().unwrap(), Role::Staff);
        assert!("ROOT".parse::<Role>().is_err());
    }
}
