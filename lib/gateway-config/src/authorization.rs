use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, JsonSchema, Clone)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Enables field-level authorization enforcement. When disabled, scope
    /// requirements attached to the schema are ignored and responses pass
    /// through unchanged.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// When enabled, denied responses carry an `extensions.authorization`
    /// object summarizing the missing scopes and the caller's actual scopes.
    #[serde(default = "default_expose_missing_scopes")]
    pub expose_missing_scopes: bool,

    /// Rejects requests for which no authenticator could establish an
    /// identity. When disabled, such requests proceed anonymously with an
    /// empty scope set.
    #[serde(default)]
    pub require_authentication: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_expose_missing_scopes() -> bool {
    true
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            expose_missing_scopes: default_expose_missing_scopes(),
            require_authentication: false,
        }
    }
}
