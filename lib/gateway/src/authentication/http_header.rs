use std::sync::Arc;

use async_trait::async_trait;
use cookie::Cookie;
use http::{header::COOKIE, HeaderMap};
use portcullis_config::jwt_auth::{JwtAuthConfig, JwtLookupLocation};
use tracing::warn;

use crate::{
    authentication::{AuthenticationError, Authenticator},
    context::Identity,
    jwt::{new_claims_cache, JwtClaimsCache, JwtError, LookupError, TokenDecoder},
};

/// Bearer-token authenticator: finds a token in the configured header or
/// cookie locations and verifies it through a [`TokenDecoder`]. Verified
/// claims are cached briefly, keyed by the raw token.
pub struct HttpHeaderAuthenticator {
    name: String,
    token_decoder: Arc<TokenDecoder>,
    lookup_locations: Vec<JwtLookupLocation>,
    claims_cache: JwtClaimsCache,
}

impl HttpHeaderAuthenticator {
    pub fn new(
        name: impl Into<String>,
        token_decoder: Arc<TokenDecoder>,
        lookup_locations: Vec<JwtLookupLocation>,
    ) -> Self {
        Self {
            name: name.into(),
            token_decoder,
            lookup_locations,
            claims_cache: new_claims_cache(),
        }
    }

    pub fn from_config(token_decoder: Arc<TokenDecoder>, config: &JwtAuthConfig) -> Self {
        Self::new(
            config.name.clone(),
            token_decoder,
            config.lookup_locations.clone(),
        )
    }

    fn lookup(&self, headers: &HeaderMap) -> Result<(Option<String>, String), LookupError> {
        for lookup_config in &self.lookup_locations {
            match lookup_config {
                JwtLookupLocation::Header { name, prefix } => {
                    if let Some(header_value) = headers.get(name.as_str()) {
                        let header_str = header_value
                            .to_str()
                            .map_err(|_| LookupError::FailedToStringifyHeader)?;

                        match prefix {
                            Some(prefix) => match header_str.strip_prefix(prefix) {
                                Some(stripped_value) => {
                                    return Ok((
                                        Some(prefix.to_string()),
                                        stripped_value.trim().to_string(),
                                    ));
                                }
                                None => {
                                    return Err(LookupError::MismatchedPrefix);
                                }
                            },
                            None => {
                                return Ok((None, header_str.to_string()));
                            }
                        }
                    }
                }
                JwtLookupLocation::Cookie { name } => {
                    if let Some(cookie_raw) = headers.get(COOKIE) {
                        let raw_cookies = match cookie_raw.to_str() {
                            Ok(cookies) => cookies.split(';'),
                            Err(e) => {
                                warn!("jwt auth failed to convert cookie header to string, ignoring cookie. error: {}", e);
                                continue;
                            }
                        };

                        for item in raw_cookies {
                            match Cookie::parse(item) {
                                Ok(v) => {
                                    let (cookie_name, cookie_value) = v.name_value_trimmed();

                                    if cookie_name == name {
                                        return Ok((None, cookie_value.to_string()));
                                    }
                                }
                                Err(e) => {
                                    warn!(
                                        "jwt auth failed to parse cookie value, ignoring cookie. error: {}",
                                        e
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        Err(LookupError::LookupFailed)
    }
}

#[async_trait]
impl Authenticator for HttpHeaderAuthenticator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<Identity>, AuthenticationError> {
        let token = match self.lookup(headers) {
            Ok((_maybe_prefix, token)) => token,
            // No usable credential for this strategy: decline. A mismatched
            // prefix means a different auth scheme, not a broken token.
            Err(LookupError::LookupFailed) | Err(LookupError::MismatchedPrefix) => return Ok(None),
            Err(err) => return Err(AuthenticationError::MalformedCredential(err)),
        };

        let token_payload = self
            .claims_cache
            .try_get_with(token.clone(), async {
                self.token_decoder.decode(&token).await.map(Arc::new)
            })
            .await
            .map_err(|err: Arc<JwtError>| AuthenticationError::InvalidCredential((*err).clone()))?;

        let scopes = token_payload.claims.extract_scopes().unwrap_or_default();

        Ok(Some(Identity::new(
            self.name.clone(),
            token_payload.claims.to_json_map(),
            scopes,
        )))
    }
}
