pub mod authentication;
pub mod authorization;
pub mod background_tasks;
pub mod context;
pub mod jwt;
pub mod logger;
pub mod modules;
pub mod pipeline;
pub mod response;
pub mod schema;

pub use crate::{
    authentication::{access_controller::AccessController, Authenticator},
    authorization::{engine::enforce_response_authorization, AuthorizationMetadata},
    context::{AuthorizationContext, Identity},
    modules::{ModuleError, ModuleRegistry, RouterModule, RouterModuleWithConfig},
    pipeline::AuthorizationPipeline,
    response::graphql_error::GraphQLError,
    schema::ResponseSchema,
};

// Re-exported for module authors, so implementing [`modules::RouterModule`]
// does not require matching our dependency versions.
pub use async_trait::async_trait;
pub use http;
pub use serde_json;
pub use tracing;
