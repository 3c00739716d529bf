use std::collections::HashMap;

use portcullis_config::modules::ModulesConfig;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::AuthorizationContext;
use crate::modules::{ModuleError, RouterModule, RouterModuleWithConfig};

type ModuleFactory =
    Box<dyn Fn(Value) -> Result<Box<dyn RouterModule>, ModuleError> + Send + Sync>;

/// Maps module names to constructors. Registration order is preserved and
/// becomes the hook dispatch order.
pub struct ModuleRegistry {
    factories: HashMap<&'static str, ModuleFactory>,
    registration_order: Vec<&'static str>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            registration_order: Vec::new(),
        }
    }

    pub fn register<M: RouterModuleWithConfig + 'static>(&mut self) {
        let name = M::module_name();
        if self.factories.contains_key(name) {
            warn!("module '{}' registered twice, keeping the first", name);
            return;
        }

        self.registration_order.push(name);
        self.factories.insert(
            name,
            Box::new(|config_value: Value| {
                let config: M::Config = serde_json::from_value(config_value)?;
                Ok(Box::new(M::from_config(config)?) as Box<dyn RouterModule>)
            }),
        );
    }

    /// Instantiates every registered module that has a configuration entry,
    /// in registration order. A module whose configuration does not
    /// deserialize or whose constructor errors fails gateway startup;
    /// requests never run under a partially loaded module chain.
    pub fn initialize_modules(
        &self,
        modules_config: &ModulesConfig,
    ) -> Result<ModuleDispatcher, ModuleError> {
        let mut modules = Vec::new();

        for name in &self.registration_order {
            let Some(config_value) = modules_config.get(*name) else {
                continue;
            };

            let factory = &self.factories[name];
            let module = factory(config_value.clone())?;
            info!("Loaded module: {}", name);
            modules.push((*name, module));
        }

        for configured_name in modules_config.keys() {
            if !self.factories.contains_key(configured_name.as_str()) {
                warn!(
                    "No module registered for configured name '{}', ignoring entry",
                    configured_name
                );
            }
        }

        Ok(ModuleDispatcher { modules })
    }
}

/// The initialized module chain. Dispatch is strictly sequential in
/// registration order; execution does not proceed until every hook of a
/// stage has completed, and the first hook error aborts the request.
pub struct ModuleDispatcher {
    modules: Vec<(&'static str, Box<dyn RouterModule>)>,
}

impl ModuleDispatcher {
    pub fn empty() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub async fn dispatch_pre_execution(
        &self,
        ctx: &mut AuthorizationContext,
    ) -> Result<(), ModuleError> {
        for (name, module) in &self.modules {
            if let Err(err) = module.on_pre_execution(ctx).await {
                warn!("module '{}' pre-execution hook failed: {}", name, err);
                return Err(err);
            }
        }

        Ok(())
    }

    pub async fn shutdown(&self) {
        for (_, module) in &self.modules {
            module.on_shutdown().await;
        }
    }
}
