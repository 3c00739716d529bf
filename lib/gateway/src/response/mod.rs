pub mod graphql_error;

use serde::Serialize;
use serde_json::Value;

use crate::authorization::metadata::FieldCoordinate;
use crate::response::graphql_error::GraphQLError;

/// The `extensions.authorization` object attached to responses that had
/// at least one field denied. Deduplicated across the whole response.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationExtension {
    pub missing_scopes: Vec<MissingScopesEntry>,
    pub actual_scopes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MissingScopesEntry {
    pub coordinate: FieldCoordinate,
    pub required: Vec<Vec<String>>,
}

/// Assembles the wire-level response body: `errors` only when non-empty,
/// `data` always, `extensions.authorization` only when denials occurred.
pub fn build_response_body(
    data: Value,
    errors: Vec<GraphQLError>,
    authorization: Option<AuthorizationExtension>,
) -> Value {
    let mut body = serde_json::Map::new();

    if !errors.is_empty() {
        body.insert(
            "errors".to_string(),
            serde_json::to_value(errors).unwrap_or(Value::Null),
        );
    }

    body.insert("data".to_string(), data);

    if let Some(authorization) = authorization {
        body.insert(
            "extensions".to_string(),
            serde_json::json!({ "authorization": authorization }),
        );
    }

    Value::Object(body)
}
