use std::sync::Arc;

use http::{HeaderMap, StatusCode};
use portcullis_config::authorization::AuthorizationConfig;
use portcullis_config::GatewayConfig;
use serde_json::Value;
use tracing::debug;

use crate::authentication::access_controller::{AccessController, AccessError};
use crate::authentication::http_header::HttpHeaderAuthenticator;
use crate::authentication::Authenticator;
use crate::authorization::engine::{enforce_response_authorization, AuthorizationOutcome};
use crate::authorization::metadata::AuthorizationMetadata;
use crate::background_tasks::BackgroundTasksManager;
use crate::context::AuthorizationContext;
use crate::jwt::jwks_manager::JwksSourceError;
use crate::jwt::TokenDecoder;
use crate::modules::registry::{ModuleDispatcher, ModuleRegistry};
use crate::modules::ModuleError;
use crate::response::graphql_error::GraphQLError;
use crate::schema::ResponseSchema;

/// Startup failure while assembling the pipeline from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PipelineInitError {
    #[error("failed to initialize jwks sources: {0}")]
    Jwks(#[from] JwksSourceError),
    #[error("failed to initialize modules: {0}")]
    Module(#[from] ModuleError),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Unauthenticated(#[from] AccessError),
    #[error("module hook failed: {0}")]
    Module(#[from] ModuleError),
}

impl PipelineError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::Unauthenticated(err) => err.status_code(),
            PipelineError::Module(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            PipelineError::Unauthenticated(err) => err.error_code(),
            PipelineError::Module(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn to_graphql_error(&self) -> GraphQLError {
        GraphQLError::from_message_and_code(self.to_string(), self.error_code())
    }
}

/// The request-time trust layer, wired together: authentication via the
/// access controller, scope adjustments via module hooks, and field-level
/// enforcement over the assembled response.
pub struct AuthorizationPipeline {
    access_controller: AccessController,
    modules: ModuleDispatcher,
    config: AuthorizationConfig,
}

impl AuthorizationPipeline {
    /// Assembles the pipeline from the root gateway configuration: the JWT
    /// authenticator when one is configured, the module chain from the given
    /// registry, and the enforcement settings. Any failure here fails
    /// gateway startup.
    pub async fn from_config(
        config: &GatewayConfig,
        registry: &ModuleRegistry,
        background_tasks: &mut BackgroundTasksManager,
    ) -> Result<Self, PipelineInitError> {
        let mut authenticators: Vec<Arc<dyn Authenticator>> = Vec::new();
        if let Some(jwt_config) = &config.jwt {
            let decoder = Arc::new(TokenDecoder::init(background_tasks, jwt_config).await?);
            authenticators.push(Arc::new(HttpHeaderAuthenticator::from_config(
                decoder, jwt_config,
            )));
        }

        let access_controller = AccessController::new(
            authenticators,
            !config.authorization.require_authentication,
        );
        let modules = registry.initialize_modules(&config.modules)?;

        Ok(Self::new(
            access_controller,
            modules,
            config.authorization.clone(),
        ))
    }

    pub fn new(
        access_controller: AccessController,
        modules: ModuleDispatcher,
        config: AuthorizationConfig,
    ) -> Self {
        Self {
            access_controller,
            modules,
            config,
        }
    }

    /// Runs authentication and the pre-execution module hooks. The returned
    /// context carries the effective scope set for the rest of the request;
    /// module hooks have already run, so the context will not change again.
    pub async fn authorize_request(
        &self,
        headers: &HeaderMap,
    ) -> Result<AuthorizationContext, PipelineError> {
        let mut ctx = self.access_controller.authorize(headers).await?;
        self.modules.dispatch_pre_execution(&mut ctx).await?;
        Ok(ctx)
    }

    /// Applies field-level enforcement to the assembled response tree.
    /// Honors the authorization config: a disabled engine passes the tree
    /// through untouched, and the missing-scopes summary is stripped when
    /// its exposure is turned off.
    pub fn enforce_response(
        &self,
        data: &mut Value,
        root_type_name: &str,
        schema: &ResponseSchema,
        metadata: &AuthorizationMetadata,
        ctx: &AuthorizationContext,
    ) -> AuthorizationOutcome {
        if !self.config.enabled {
            debug!("field-level authorization is disabled, skipping enforcement");
            return AuthorizationOutcome::default();
        }

        let mut outcome =
            enforce_response_authorization(data, root_type_name, schema, metadata, ctx);
        if !self.config.expose_missing_scopes {
            outcome.authorization = None;
        }
        outcome
    }

    pub async fn shutdown(&self) {
        self.modules.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::authentication::{AuthenticationError, Authenticator};
    use crate::authorization::metadata::FieldCoordinate;
    use crate::context::Identity;
    use crate::modules::registry::ModuleRegistry;
    use crate::modules::{RouterModule, RouterModuleWithConfig};
    use crate::response::build_response_body;
    use crate::schema::FieldShape;

    /// Reads scopes from the `x-test-scopes` header, space separated.
    /// Declines when the header is missing.
    struct HeaderScopesAuthenticator;

    #[async_trait]
    impl Authenticator for HeaderScopesAuthenticator {
        fn name(&self) -> &str {
            "test-header"
        }

        async fn authenticate(
            &self,
            headers: &HeaderMap,
        ) -> Result<Option<Identity>, AuthenticationError> {
            let Some(value) = headers.get("x-test-scopes") else {
                return Ok(None);
            };
            let scopes = value
                .to_str()
                .unwrap_or_default()
                .split_whitespace()
                .map(|s| s.to_string());
            Ok(Some(Identity::new(
                self.name(),
                serde_json::Map::new(),
                scopes,
            )))
        }
    }

    fn employee_schema() -> ResponseSchema {
        let mut schema = ResponseSchema::default();
        schema
            .add_field(
                "Query",
                "employees",
                FieldShape::new("Employee").list_of(false),
            )
            .add_field("Employee", "id", FieldShape::new("Int").non_null())
            .add_field("Employee", "startDate", FieldShape::new("String"));
        schema
    }

    fn start_date_metadata() -> AuthorizationMetadata {
        AuthorizationMetadata::build(vec![(
            FieldCoordinate::new("Employee", "startDate"),
            vec![vec![
                "read:employee".to_string(),
                "read:private".to_string(),
            ]],
        )])
        .unwrap()
    }

    fn pipeline(modules: ModuleDispatcher, config: AuthorizationConfig) -> AuthorizationPipeline {
        let controller =
            AccessController::new(vec![Arc::new(HeaderScopesAuthenticator)], false);
        AuthorizationPipeline::new(controller, modules, config)
    }

    fn scope_headers(scopes: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-test-scopes", scopes.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn sufficient_scopes_pass_the_response_through() {
        let pipeline = pipeline(ModuleDispatcher::empty(), AuthorizationConfig::default());
        let ctx = pipeline
            .authorize_request(&scope_headers("read:employee read:private"))
            .await
            .unwrap();

        let mut data = json!({ "employees": [{ "id": 1, "startDate": "2020-01-01" }] });
        let expected = data.clone();
        let outcome = pipeline.enforce_response(
            &mut data,
            "Query",
            &employee_schema(),
            &start_date_metadata(),
            &ctx,
        );

        assert_eq!(data, expected);
        assert!(outcome.errors.is_empty());
        assert_eq!(
            build_response_body(data, outcome.errors, outcome.authorization),
            json!({ "data": expected })
        );
    }

    #[tokio::test]
    async fn missing_scopes_null_fields_and_summarize() {
        let pipeline = pipeline(ModuleDispatcher::empty(), AuthorizationConfig::default());
        let ctx = pipeline
            .authorize_request(&scope_headers("read:employee"))
            .await
            .unwrap();

        let mut data = json!({
            "employees": [
                { "id": 1, "startDate": "2020-01-01" },
                { "id": 2, "startDate": "2021-07-15" },
            ]
        });
        let outcome = pipeline.enforce_response(
            &mut data,
            "Query",
            &employee_schema(),
            &start_date_metadata(),
            &ctx,
        );

        let body = build_response_body(data, outcome.errors, outcome.authorization);
        assert_eq!(
            body,
            json!({
                "errors": [
                    {
                        "message": "Unauthorized to load field 'Query.employees.startDate', Reason: missing required scopes.",
                        "path": ["employees", 0, "startDate"],
                        "extensions": { "code": "UNAUTHORIZED_FIELD_OR_TYPE" },
                    },
                    {
                        "message": "Unauthorized to load field 'Query.employees.startDate', Reason: missing required scopes.",
                        "path": ["employees", 1, "startDate"],
                        "extensions": { "code": "UNAUTHORIZED_FIELD_OR_TYPE" },
                    },
                ],
                "data": {
                    "employees": [
                        { "id": 1, "startDate": null },
                        { "id": 2, "startDate": null },
                    ]
                },
                "extensions": {
                    "authorization": {
                        "missingScopes": [
                            {
                                "coordinate": { "typeName": "Employee", "fieldName": "startDate" },
                                "required": [["read:employee", "read:private"]],
                            }
                        ],
                        "actualScopes": ["read:employee"],
                    }
                },
            })
        );
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected_before_execution() {
        let pipeline = pipeline(ModuleDispatcher::empty(), AuthorizationConfig::default());
        let err = pipeline
            .authorize_request(&HeaderMap::new())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "UNAUTHENTICATED");
    }

    #[derive(serde::Deserialize)]
    struct GrantConfig {
        scopes: Vec<String>,
    }

    struct GrantScopesModule {
        scopes: Vec<String>,
    }

    #[async_trait]
    impl RouterModule for GrantScopesModule {
        async fn on_pre_execution(
            &self,
            ctx: &mut AuthorizationContext,
        ) -> Result<(), ModuleError> {
            for scope in &self.scopes {
                ctx.grant_scope(scope.clone());
            }
            Ok(())
        }
    }

    impl RouterModuleWithConfig for GrantScopesModule {
        fn module_name() -> &'static str {
            "grantScopesModule"
        }

        type Config = GrantConfig;

        fn from_config(config: Self::Config) -> Result<Self, ModuleError> {
            Ok(Self {
                scopes: config.scopes,
            })
        }
    }

    #[tokio::test]
    async fn module_granted_scopes_satisfy_field_requirements() {
        let mut registry = ModuleRegistry::new();
        registry.register::<GrantScopesModule>();
        let modules = registry
            .initialize_modules(
                &[(
                    "grantScopesModule".to_string(),
                    json!({ "scopes": ["read:private"] }),
                )]
                .into_iter()
                .collect(),
            )
            .unwrap();

        let pipeline = pipeline(modules, AuthorizationConfig::default());
        let ctx = pipeline
            .authorize_request(&scope_headers("read:employee"))
            .await
            .unwrap();
        assert!(ctx.has_scope("read:private"));

        let mut data = json!({ "employees": [{ "id": 1, "startDate": "2020-01-01" }] });
        let expected = data.clone();
        let outcome = pipeline.enforce_response(
            &mut data,
            "Query",
            &employee_schema(),
            &start_date_metadata(),
            &ctx,
        );

        assert_eq!(data, expected);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn disabled_engine_passes_everything_through() {
        let pipeline = pipeline(
            ModuleDispatcher::empty(),
            AuthorizationConfig {
                enabled: false,
                ..AuthorizationConfig::default()
            },
        );
        let ctx = pipeline.authorize_request(&scope_headers("")).await.unwrap();

        let mut data = json!({ "employees": [{ "id": 1, "startDate": "2020-01-01" }] });
        let expected = data.clone();
        let outcome = pipeline.enforce_response(
            &mut data,
            "Query",
            &employee_schema(),
            &start_date_metadata(),
            &ctx,
        );

        assert_eq!(data, expected);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn pipeline_from_config_honors_require_authentication() {
        let mut registry = ModuleRegistry::new();
        registry.register::<GrantScopesModule>();

        let mut config = portcullis_config::GatewayConfig::default();
        config.modules = [(
            "grantScopesModule".to_string(),
            json!({ "scopes": ["read:employee"] }),
        )]
        .into_iter()
        .collect();

        let mut background_tasks = crate::background_tasks::BackgroundTasksManager::new();
        let open_pipeline =
            AuthorizationPipeline::from_config(&config, &registry, &mut background_tasks)
                .await
                .unwrap();

        // No authenticator is configured, so the request proceeds anonymously
        // and still passes through the module chain.
        let ctx = open_pipeline
            .authorize_request(&HeaderMap::new())
            .await
            .unwrap();
        assert!(!ctx.is_authenticated());
        assert!(ctx.has_scope("read:employee"));

        config.authorization.require_authentication = true;
        let closed_pipeline =
            AuthorizationPipeline::from_config(&config, &registry, &mut background_tasks)
                .await
                .unwrap();
        let err = closed_pipeline
            .authorize_request(&HeaderMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_scopes_summary_can_be_suppressed() {
        let pipeline = pipeline(
            ModuleDispatcher::empty(),
            AuthorizationConfig {
                expose_missing_scopes: false,
                ..AuthorizationConfig::default()
            },
        );
        let ctx = pipeline
            .authorize_request(&scope_headers("read:employee"))
            .await
            .unwrap();

        let mut data = json!({ "employees": [{ "id": 1, "startDate": "2020-01-01" }] });
        let outcome = pipeline.enforce_response(
            &mut data,
            "Query",
            &employee_schema(),
            &start_date_metadata(),
            &ctx,
        );

        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.authorization.is_none());
    }
}
