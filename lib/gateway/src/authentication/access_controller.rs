use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use tracing::{debug, warn};

use crate::{
    authentication::{AuthenticationError, Authenticator},
    context::AuthorizationContext,
};

/// Tries an ordered list of authenticators against each inbound request.
///
/// The order is caller-controlled and significant: the first authenticator to
/// produce an identity wins, and the first to hard-fail aborts the chain even
/// when a later authenticator might have succeeded.
pub struct AccessController {
    authenticators: Vec<Arc<dyn Authenticator>>,
    allow_unauthenticated: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("no authenticator could establish an identity")]
    Unauthenticated,
    #[error("authenticator '{authenticator}' rejected the request: {source}")]
    InvalidCredential {
        authenticator: String,
        source: AuthenticationError,
    },
}

impl AccessError {
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "UNAUTHENTICATED",
            AccessError::InvalidCredential { .. } => "UNAUTHENTICATED",
        }
    }
}

impl AccessController {
    pub fn new(authenticators: Vec<Arc<dyn Authenticator>>, allow_unauthenticated: bool) -> Self {
        Self {
            authenticators,
            allow_unauthenticated,
        }
    }

    pub async fn authorize(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthorizationContext, AccessError> {
        for authenticator in &self.authenticators {
            match authenticator.authenticate(headers).await {
                Ok(Some(identity)) => {
                    debug!(
                        "request authenticated by '{}' with {} scope(s)",
                        authenticator.name(),
                        identity.scopes().len()
                    );
                    return Ok(AuthorizationContext::authenticated(identity));
                }
                Ok(None) => continue,
                Err(source) => {
                    warn!(
                        "authenticator '{}' rejected the credential: {}",
                        authenticator.name(),
                        source
                    );
                    return Err(AccessError::InvalidCredential {
                        authenticator: authenticator.name().to_string(),
                        source,
                    });
                }
            }
        }

        if self.allow_unauthenticated {
            debug!("no authenticator matched, allowing anonymous access");
            return Ok(AuthorizationContext::anonymous());
        }

        Err(AccessError::Unauthenticated)
    }
}
