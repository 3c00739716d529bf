pub mod claims_cache;
pub mod context;
pub mod errors;
pub mod jwks_manager;
pub mod token_decoder;

pub use claims_cache::{new_claims_cache, JwtClaimsCache};
pub use context::{Audience, JwtClaims, JwtTokenPayload};
pub use errors::{JwtError, LookupError};
pub use token_decoder::TokenDecoder;

#[cfg(test)]
mod tests;
