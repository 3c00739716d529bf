use ahash::HashSet;
use serde_json::Value;

use crate::authorization::metadata::{AuthorizationMetadata, FieldCoordinate, ScopeId};
use crate::context::AuthorizationContext;
use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};
use crate::response::{AuthorizationExtension, MissingScopesEntry};
use crate::schema::{FieldShape, ResponseSchema};

pub const UNAUTHORIZED_FIELD_OR_TYPE_CODE: &str = "UNAUTHORIZED_FIELD_OR_TYPE";

/// Result of enforcing field-level authorization on a response tree.
#[derive(Debug, Default)]
pub struct AuthorizationOutcome {
    pub errors: Vec<GraphQLError>,
    pub authorization: Option<AuthorizationExtension>,
}

/// Walks the response `data` tree and nulls out every field the caller's
/// scopes do not satisfy, collecting one error per denied field. Non-null
/// violations propagate to the nearest nullable ancestor, matching the
/// usual GraphQL error propagation rules. The tree is mutated in place.
pub fn enforce_response_authorization(
    data: &mut Value,
    root_type_name: &str,
    schema: &ResponseSchema,
    metadata: &AuthorizationMetadata,
    ctx: &AuthorizationContext,
) -> AuthorizationOutcome {
    if metadata.is_empty() {
        return AuthorizationOutcome::default();
    }

    let scope_ids = metadata.scope_ids_for(ctx.scopes().iter());
    let mut walk = EngineWalk {
        schema,
        metadata,
        scope_ids,
        root_type_name,
        errors: Vec::new(),
        missing_entries: Vec::new(),
        reported_coordinates: HashSet::default(),
    };

    let mut path = Vec::new();
    let mut field_names = Vec::new();
    if let Value::Object(obj) = &mut *data {
        if let SubtreeOutcome::MustNull =
            walk.walk_object(obj, root_type_name, &mut path, &mut field_names)
        {
            *data = Value::Null;
        }
    }

    let authorization = if walk.errors.is_empty() {
        None
    } else {
        let mut actual_scopes: Vec<String> = ctx.scopes().iter().cloned().collect();
        actual_scopes.sort();
        Some(AuthorizationExtension {
            missing_scopes: walk.missing_entries,
            actual_scopes,
        })
    };

    AuthorizationOutcome {
        errors: walk.errors,
        authorization,
    }
}

/// Bubbled verdict for a subtree: either the value may stay where it is, or
/// a non-null violation inside it forces the enclosing slot to become null.
enum SubtreeOutcome {
    Kept,
    MustNull,
}

struct EngineWalk<'a> {
    schema: &'a ResponseSchema,
    metadata: &'a AuthorizationMetadata,
    scope_ids: HashSet<ScopeId>,
    root_type_name: &'a str,
    errors: Vec<GraphQLError>,
    missing_entries: Vec<MissingScopesEntry>,
    reported_coordinates: HashSet<FieldCoordinate>,
}

impl EngineWalk<'_> {
    fn walk_object(
        &mut self,
        obj: &mut serde_json::Map<String, Value>,
        type_name: &str,
        path: &mut Vec<GraphQLErrorPathSegment>,
        field_names: &mut Vec<String>,
    ) -> SubtreeOutcome {
        let mut must_null_self = false;

        for (field_name, value) in obj.iter_mut() {
            // The requirement is checked even when the schema carries no
            // shape for the field: a requirement the walk cannot fully
            // evaluate must deny, never allow. A shapeless denied field is
            // treated as nullable, so it nulls in place without bubbling.
            let shape = self.schema.field(type_name, field_name);
            let requirement = self.metadata.requirement_for(type_name, field_name);
            if shape.is_none() && requirement.is_none() {
                continue;
            }

            path.push(GraphQLErrorPathSegment::String(field_name.clone()));
            field_names.push(field_name.clone());

            let denied = match requirement {
                Some(requirement) => !self.metadata.is_satisfied(requirement, &self.scope_ids),
                None => false,
            };

            if denied {
                self.report_denial(type_name, field_name, path, field_names);
                *value = Value::Null;
                if shape.is_some_and(|shape| shape.non_null) {
                    must_null_self = true;
                }
            } else if let Some(shape) = shape {
                if let SubtreeOutcome::MustNull =
                    self.walk_field_value(&mut *value, shape, path, field_names)
                {
                    *value = Value::Null;
                    if shape.non_null {
                        must_null_self = true;
                    }
                }
            }

            path.pop();
            field_names.pop();
        }

        if must_null_self {
            SubtreeOutcome::MustNull
        } else {
            SubtreeOutcome::Kept
        }
    }

    fn walk_field_value(
        &mut self,
        value: &mut Value,
        shape: &FieldShape,
        path: &mut Vec<GraphQLErrorPathSegment>,
        field_names: &mut Vec<String>,
    ) -> SubtreeOutcome {
        match shape.list {
            Some(ref list_shape) => {
                let Value::Array(items) = value else {
                    return SubtreeOutcome::Kept;
                };

                let mut list_must_null = false;
                for (index, item) in items.iter_mut().enumerate() {
                    let Value::Object(item_obj) = &mut *item else {
                        continue;
                    };
                    path.push(GraphQLErrorPathSegment::Index(index));
                    let outcome =
                        self.walk_object(item_obj, &shape.output_type_name, path, field_names);
                    path.pop();

                    if let SubtreeOutcome::MustNull = outcome {
                        if list_shape.item_non_null {
                            list_must_null = true;
                        } else {
                            *item = Value::Null;
                        }
                    }
                }

                if list_must_null {
                    SubtreeOutcome::MustNull
                } else {
                    SubtreeOutcome::Kept
                }
            }
            None => {
                let Value::Object(obj) = value else {
                    return SubtreeOutcome::Kept;
                };
                self.walk_object(obj, &shape.output_type_name, path, field_names)
            }
        }
    }

    fn report_denial(
        &mut self,
        type_name: &str,
        field_name: &str,
        path: &[GraphQLErrorPathSegment],
        field_names: &[String],
    ) {
        let message = format!(
            "Unauthorized to load field '{}.{}', Reason: missing required scopes.",
            self.root_type_name,
            field_names.join(".")
        );
        self.errors.push(
            GraphQLError::from_message_and_code(message, UNAUTHORIZED_FIELD_OR_TYPE_CODE)
                .with_path(path.to_vec()),
        );

        let coordinate = FieldCoordinate::new(type_name, field_name);
        if self.reported_coordinates.contains(&coordinate) {
            return;
        }
        let required = self
            .metadata
            .requirement_for(type_name, field_name)
            .map(|requirement| self.metadata.resolve_groups(requirement))
            .unwrap_or_default();
        self.reported_coordinates.insert(coordinate.clone());
        self.missing_entries.push(MissingScopesEntry {
            coordinate,
            required,
        });
    }
}
