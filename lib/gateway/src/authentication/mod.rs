pub mod access_controller;
pub mod http_header;

use async_trait::async_trait;
use http::HeaderMap;

use crate::context::Identity;
use crate::jwt::{JwtError, LookupError};

/// A single-strategy identity extractor.
///
/// `Ok(None)` means the authenticator's expected credential is absent from
/// the request: a decline, letting the access controller try the next one.
/// `Err(_)` means a credential was present but invalid, which aborts the
/// whole chain.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The configured name of this authenticator, recorded on the context
    /// when it is the one that establishes the identity.
    fn name(&self) -> &str;

    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, AuthenticationError>;
}

/// Hard authentication failure: a credential was found but could not be accepted.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("credential rejected: {0}")]
    InvalidCredential(#[from] JwtError),
    #[error("malformed credential: {0}")]
    MalformedCredential(LookupError),
}
