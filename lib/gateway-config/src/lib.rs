pub mod authorization;
pub mod jwt_auth;
pub mod log;
pub mod modules;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    authorization::AuthorizationConfig, jwt_auth::JwtAuthConfig, log::LoggingConfig,
    modules::ModulesConfig,
};

/// Root configuration of the gateway trust layer.
///
/// Loading this struct from a file or the environment is the embedding
/// application's concern; only the serde shape is defined here.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// The gateway logger configuration.
    ///
    /// The gateway is configured to be mostly silent (`info`) level, and will print only
    /// important messages, warnings, and errors.
    #[serde(default)]
    pub log: LoggingConfig,

    /// JWT authentication. When absent, no token-based authenticator is constructed
    /// and only anonymous access (if allowed) is possible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt: Option<JwtAuthConfig>,

    /// Field-level authorization enforcement.
    #[serde(default)]
    pub authorization: AuthorizationConfig,

    /// Per-module configuration, keyed by module name. Values are opaque to the
    /// gateway and handed to the module's constructor as-is.
    #[serde(default)]
    pub modules: ModulesConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_config() {
        let config: GatewayConfig = serde_json::from_value(serde_json::json!({})).unwrap();

        assert!(config.jwt.is_none());
        assert!(config.authorization.enabled);
        assert!(config.authorization.expose_missing_scopes);
        assert!(!config.authorization.require_authentication);
        assert!(config.modules.is_empty());
    }

    #[test]
    fn unknown_root_fields_are_rejected() {
        let result: Result<GatewayConfig, _> =
            serde_json::from_value(serde_json::json!({ "unexpected": true }));
        assert!(result.is_err());
    }
}
