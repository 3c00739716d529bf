use std::collections::HashMap;

/// Per-module configuration, keyed by module name.
///
/// The values are opaque JSON handed to each module's constructor; the
/// gateway never interprets them.
pub type ModulesConfig = HashMap<String, serde_json::Value>;
