use ahash::{HashMap, HashSet};
use serde_json::Value;

/// The result of a successful authentication: which provider established it,
/// the verified claims, and the scopes derived from them.
///
/// Immutable once authentication completes. Module hooks adjust the
/// [`AuthorizationContext`]'s *effective* scope set instead; the identity's
/// own claims and scopes stay as the authenticator produced them.
#[derive(Debug, Clone)]
pub struct Identity {
    provider: String,
    claims: serde_json::Map<String, Value>,
    scopes: HashSet<String>,
}

impl Identity {
    pub fn new(
        provider: impl Into<String>,
        claims: serde_json::Map<String, Value>,
        scopes: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            claims,
            scopes: scopes.into_iter().collect(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn claims(&self) -> &serde_json::Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn scopes(&self) -> &HashSet<String> {
        &self.scopes
    }
}

/// Per-request authorization state.
///
/// Created by the access controller, mutated by module hooks (scope set and
/// extension bag only), then handed to the authorization engine by shared
/// reference. The hooks-then-engine ordering is enforced by the pipeline;
/// the engine can never observe a context mid-mutation because it only ever
/// borrows it immutably.
#[derive(Debug, Default)]
pub struct AuthorizationContext {
    identity: Option<Identity>,
    scopes: HashSet<String>,
    extensions: HashMap<String, Value>,
}

impl AuthorizationContext {
    /// Context for a request that carried no credential, with an empty scope set.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for an authenticated request. The effective scope set starts
    /// as a copy of the identity's scopes.
    pub fn authenticated(identity: Identity) -> Self {
        Self {
            scopes: identity.scopes().clone(),
            identity: Some(identity),
            extensions: HashMap::default(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Name of the authenticator that established the identity, if any.
    /// An outer layer typically surfaces this as a diagnostic response header.
    pub fn authenticated_by(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.provider())
    }

    /// The effective scope set used for every field decision of this request.
    pub fn scopes(&self) -> &HashSet<String> {
        &self.scopes
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn grant_scope(&mut self, scope: impl Into<String>) {
        self.scopes.insert(scope.into());
    }

    pub fn revoke_scope(&mut self, scope: &str) {
        self.scopes.remove(scope);
    }

    /// Free-form storage for data derived by module hooks.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    pub fn set_extension(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }
}
