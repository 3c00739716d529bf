use std::str::FromStr;
use std::sync::Arc;

use jsonwebtoken::{
    decode, decode_header,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Header, Validation,
};
use portcullis_config::jwt_auth::JwtAuthConfig;
use tracing::warn;

use crate::{
    background_tasks::BackgroundTasksManager,
    jwt::{
        context::{Audience, JwtClaims, JwtTokenPayload},
        errors::JwtError,
        jwks_manager::{JwksManager, JwksSourceError},
    },
};

/// Verifies and decodes signed tokens against the key sets owned by a
/// [`JwksManager`]. Construction prefetches eager sources and registers the
/// polling loops; decoding is pure after that, apart from one forced refresh
/// when a token references a key no cached set knows.
pub struct TokenDecoder {
    jwks: JwksManager,
    issuers: Option<Vec<String>>,
    audiences: Option<Vec<String>>,
    allowed_algorithms: Option<Vec<Algorithm>>,
}

impl TokenDecoder {
    pub async fn init(
        background_tasks_mgr: &mut BackgroundTasksManager,
        config: &JwtAuthConfig,
    ) -> Result<Self, JwksSourceError> {
        let jwks = JwksManager::from_config(&config.jwks_providers);

        // Sources marked for prefetch are loaded now; a failure here fails startup.
        jwks.prefetch_sources().await?;
        jwks.register_background_tasks(background_tasks_mgr);

        Ok(TokenDecoder {
            jwks,
            issuers: config.issuers.clone(),
            audiences: config.audiences.clone(),
            allowed_algorithms: config.allowed_algorithms.clone(),
        })
    }

    pub async fn decode(&self, token: &str) -> Result<JwtTokenPayload, JwtError> {
        let header = decode_header(token).map_err(JwtError::InvalidJwtHeader)?;

        let jwk_set = match Self::find_matching_jwks(&header, &self.jwks.all()) {
            Some(set) => set,
            None => {
                // The key id may have rotated since the last poll. Refresh once,
                // then give up if the key is still unknown.
                self.jwks.refresh_all().await;
                Self::find_matching_jwks(&header, &self.jwks.all())
                    .ok_or(JwtError::FailedToLocateKey)?
            }
        };

        self.decode_and_validate_token(&header, token, &jwk_set.keys)
    }

    fn find_matching_jwks(jwt_header: &Header, jwks: &[Arc<JwkSet>]) -> Option<Arc<JwkSet>> {
        // If `kid` is available on the header, we can try to match it to the `kid` on the available JWKs.
        if let Some(jwt_kid) = &jwt_header.kid {
            for jwk in jwks {
                for key in &jwk.keys {
                    if key.common.key_id.as_ref().is_some_and(|v| v == jwt_kid) {
                        return Some(jwk.clone());
                    }
                }
            }
        }

        // If we don't have `kid` on the token, we should try to match the `alg` field.
        for jwk in jwks {
            for key in &jwk.keys {
                if let Some(key_alg) = key.common.key_algorithm {
                    match Algorithm::from_str(&key_alg.to_string()) {
                        Ok(key_alg_cmp) if key_alg_cmp == jwt_header.alg => {
                            return Some(jwk.clone())
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!("skipping jwk with unsupported algorithm: {}", err);
                        }
                    }
                }
            }
        }

        None
    }

    fn decode_and_validate_token(
        &self,
        header: &Header,
        token: &str,
        jwks: &[Jwk],
    ) -> Result<JwtTokenPayload, JwtError> {
        let mut failures = Vec::with_capacity(jwks.len());

        for jwk in jwks {
            match self.try_decode_from_jwk(header, token, jwk) {
                Ok(token_data) => return Ok(token_data),
                Err(err) => failures.push(err),
            }
        }

        Err(JwtError::AllKeysFailedToDecode(failures))
    }

    fn try_decode_from_jwk(
        &self,
        header: &Header,
        token: &str,
        jwk: &Jwk,
    ) -> Result<JwtTokenPayload, JwtError> {
        let decoding_key = DecodingKey::from_jwk(jwk).map_err(JwtError::InvalidDecodingKey)?;

        let alg = match jwk.common.key_algorithm {
            Some(key_alg) => Algorithm::from_str(&key_alg.to_string())
                .map_err(JwtError::JwkAlgorithmNotSupported)?,
            None => header.alg,
        };

        // Make sure the algorithm is in the allowed algorithms before proceeding
        if let Some(allowed) = &self.allowed_algorithms {
            if !allowed.contains(&alg) {
                return Err(JwtError::JwkAlgorithmNotSupported(
                    jsonwebtoken::errors::ErrorKind::InvalidAlgorithm.into(),
                ));
            }
        }

        let mut validation = Validation::new(alg);

        // This only validates the existence of the claim, it does not validate the values, we'll do it after decoding.
        if let Some(iss) = &self.issuers {
            validation.set_issuer(iss);
        }

        // This only validates the existence of the claim, it does not validate the values, we'll do it after decoding.
        if let Some(aud) = &self.audiences {
            validation.set_audience(aud);
        }

        let token_data = decode::<JwtClaims>(token, &decoding_key, &validation)
            .map_err(JwtError::FailedToDecodeToken)?;

        match (&self.issuers, &token_data.claims.iss) {
            (Some(issuers), Some(token_iss)) => {
                if !issuers.contains(token_iss) {
                    return Err(JwtError::FailedToDecodeToken(
                        jsonwebtoken::errors::ErrorKind::InvalidIssuer.into(),
                    ));
                }
            }
            (Some(_), None) => {
                return Err(JwtError::FailedToDecodeToken(
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer.into(),
                ));
            }
            _ => {}
        };

        match (&self.audiences, &token_data.claims.aud) {
            (Some(audiences), Some(token_aud)) => {
                let all_valid = match token_aud {
                    Audience::Single(s) => audiences.contains(s),
                    Audience::Multiple(s) => s.iter().all(|v| audiences.contains(v)),
                };

                if !all_valid {
                    return Err(JwtError::FailedToDecodeToken(
                        jsonwebtoken::errors::ErrorKind::InvalidAudience.into(),
                    ));
                }
            }
            (Some(_), None) => {
                return Err(JwtError::FailedToDecodeToken(
                    jsonwebtoken::errors::ErrorKind::InvalidAudience.into(),
                ));
            }
            _ => {}
        };

        Ok(token_data)
    }
}
