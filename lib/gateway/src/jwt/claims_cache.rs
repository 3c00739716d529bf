use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use moka::future::Cache;
use moka::Expiry;

use crate::jwt::context::JwtTokenPayload;

/// Cache for validated JWT claims to avoid re-verifying on every request.
/// The cache key is the raw JWT token string. Entries live for a few seconds,
/// but never past the token's `exp` date.
pub type JwtClaimsCache = Cache<String, Arc<JwtTokenPayload>>;

/// Default TTL for JWT claims cache entries (5 seconds)
const DEFAULT_JWT_CACHE_TTL_SECS: u64 = 5;

const JWT_CACHE_MAX_CAPACITY: u64 = 10_000;

struct JwtClaimsExpiry;

impl Expiry<String, Arc<JwtTokenPayload>> for JwtClaimsExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Arc<JwtTokenPayload>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        const DEFAULT_TTL: Duration = Duration::from_secs(DEFAULT_JWT_CACHE_TTL_SECS);

        // if token has no exp claim, use default TTL (avoids syscall)
        let exp = match value.claims.exp {
            Some(e) => e,
            None => return Some(DEFAULT_TTL),
        };

        let now = match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs(),
            Err(_) => return Some(DEFAULT_TTL), // Clock error: fall back to default
        };

        // If token is already expired, return zero TTL to remove it immediately
        if exp <= now {
            return Some(Duration::ZERO);
        }

        // Short-lived tokens (exp < 5s) are evicted when they expire,
        // long-lived tokens still respect the cache limit.
        Some(DEFAULT_TTL.min(Duration::from_secs(exp - now)))
    }
}

pub fn new_claims_cache() -> JwtClaimsCache {
    Cache::builder()
        .max_capacity(JWT_CACHE_MAX_CAPACITY)
        .expire_after(JwtClaimsExpiry)
        .build()
}
