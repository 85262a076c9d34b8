use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::identity::Principal;
use crate::state::AppState;

/// Principal behind the request's bearer token, if one was sent.
///
/// A missing header yields `None`; a header that is present but does not
/// resolve rejects the request as unauthenticated.
pub struct MaybePrincipal(pub Option<Principal>);

impl MaybePrincipal {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybePrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Self(None));
        };

        let header = header.to_str().map_err(|_| {
            AppError::Unauthenticated("authorization header is not valid text".to_string())
        })?;
        let principal = state.identity.resolve_header(header)?;

        Ok(Self(Some(principal)))
    }
}
