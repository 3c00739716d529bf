use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct JwtAuthConfig {
    /// A name identifying this authenticator. Surfaced on the authorization
    /// context (and typically in a diagnostic response header) when it is the
    /// one that established the caller's identity.
    #[serde(default = "default_authenticator_name")]
    pub name: String,

    /// A list of JWKS providers to use for verifying the JWT signature.
    /// Can be either a path to a local JSON file on the file-system, or a URL to a remote JWKS provider.
    pub jwks_providers: Vec<JwksProviderSourceConfig>,

    /// Specify the [principal](https://tools.ietf.org/html/rfc7519#section-4.1) that issued the JWT, usually a URL or an email address.
    /// If specified, it has to match the `iss` field in JWT, otherwise the token's `iss` field is not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuers: Option<Vec<String>>,

    /// The list of [JWT audiences](https://tools.ietf.org/html/rfc7519#section-4.1.3) allowed to access.
    /// If this field is set, the token's `aud` field must be one of the values in this list, otherwise the token's `aud` field is not checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audiences: Option<Vec<String>>,

    /// A list of locations to look up for the JWT token in the incoming HTTP request.
    /// The first one that is found will be used.
    #[serde(
        default = "default_lookup_locations",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub lookup_locations: Vec<JwtLookupLocation>,

    /// List of allowed algorithms for verifying the JWT signature.
    /// If not specified, the default list of all supported algorithms in [`jsonwebtoken` crate](https://crates.io/crates/jsonwebtoken) are used.
    #[serde(
        skip_serializing_if = "Option::is_none",
        default = "default_allowed_algorithms"
    )]
    #[schemars(with = "Option<Vec<String>>")]
    pub allowed_algorithms: Option<Vec<Algorithm>>,
}

fn default_authenticator_name() -> String {
    "jwt".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "source")]
pub enum JwksProviderSourceConfig {
    /// A local file on the file-system. This file will be read once on startup and cached.
    #[serde(rename = "file")]
    #[schemars(title = "file")]
    File {
        /// A path to a local file on the file-system.
        path: PathBuf,
    },
    /// A remote JWKS provider. The JWKS will be fetched via HTTP/HTTPS and cached.
    #[serde(rename = "remote")]
    #[schemars(title = "remote")]
    Remote {
        /// The URL to fetch the JWKS key set from, via HTTP/HTTPS.
        url: String,
        #[serde(
            deserialize_with = "humantime_serde::deserialize",
            serialize_with = "humantime_serde::serialize",
            default = "default_polling_interval"
        )]
        #[schemars(with = "String")]
        /// How often the JWKS should be polled for updates.
        polling_interval: Option<Duration>,
        /// If set to `true`, the JWKS will be fetched on startup and cached. In case of invalid JWKS, startup fails.
        /// If set to `false`, the JWKS will be fetched when the first polling tick fires.
        prefetch: Option<bool>,
    },
}

fn default_polling_interval() -> Option<Duration> {
    // Some providers like MS Azure have rate limits configured, so default to 10 minutes
    // like Envoy does, and let users adjust it if needed.
    Some(Duration::from_secs(10 * 60))
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "source")]
pub enum JwtLookupLocation {
    /// An HTTP header, with an optional scheme prefix (e.g. `Bearer`).
    #[serde(rename = "header")]
    #[schemars(title = "header")]
    Header {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    /// A cookie by name.
    #[serde(rename = "cookie")]
    #[schemars(title = "cookie")]
    Cookie { name: String },
}

pub fn default_lookup_locations() -> Vec<JwtLookupLocation> {
    vec![JwtLookupLocation::Header {
        name: "Authorization".to_string(),
        prefix: Some("Bearer".to_string()),
    }]
}

pub fn default_allowed_algorithms() -> Option<Vec<Algorithm>> {
    Some(vec![
        Algorithm::HS256,
        Algorithm::HS384,
        Algorithm::HS512,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
        Algorithm::EdDSA,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_provider_parses_humantime_interval() {
        let config: JwtAuthConfig = serde_json::from_value(serde_json::json!({
            "jwks_providers": [
                {
                    "source": "remote",
                    "url": "https://idp.example.com/jwks.json",
                    "polling_interval": "2m",
                    "prefetch": true
                }
            ]
        }))
        .unwrap();

        assert_eq!(config.name, "jwt");
        match &config.jwks_providers[0] {
            JwksProviderSourceConfig::Remote {
                polling_interval, ..
            } => {
                assert_eq!(*polling_interval, Some(Duration::from_secs(120)));
            }
            other => panic!("unexpected provider: {:?}", other),
        }
        assert!(matches!(
            config.lookup_locations[0],
            JwtLookupLocation::Header { .. }
        ));
        assert!(config.allowed_algorithms.is_some());
    }
}
