pub mod registry;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::context::AuthorizationContext;

pub use registry::{ModuleDispatcher, ModuleRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("invalid module configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    #[error("module hook failed: {0}")]
    HookFailed(#[from] anyhow::Error),
}

/// A named unit of caller-supplied logic invoked at request lifecycle stages.
///
/// Every hook has a default no-op implementation; a module only overrides the
/// stages it cares about. Hooks run strictly in registration order and may
/// mutate the request's effective scope set and extension bag; the identity
/// itself is not reachable mutably. A hook error aborts the request before
/// any field resolves; authorization is never evaluated under a partially
/// applied module chain.
///
/// Modules are shared across concurrent requests: any state beyond the
/// per-request context must be synchronized by the module author.
#[async_trait]
pub trait RouterModule: Send + Sync + 'static {
    /// Runs after authentication and before field resolution begins.
    async fn on_pre_execution(&self, ctx: &mut AuthorizationContext) -> Result<(), ModuleError> {
        let _ = ctx;
        Ok(())
    }

    async fn on_shutdown(&self) {}
}

/// Construction surface for modules loaded through the [`ModuleRegistry`]:
/// a unique name plus a typed view of the opaque per-module configuration.
pub trait RouterModuleWithConfig: RouterModule {
    fn module_name() -> &'static str;

    type Config: DeserializeOwned;

    fn from_config(config: Self::Config) -> Result<Self, ModuleError>
    where
        Self: Sized;
}
