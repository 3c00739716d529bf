use std::fmt;

use ahash::{HashMap, HashSet};
use lasso2::{Rodeo, Spur};
use serde::Serialize;

/// Unique identifier for a scope string, interned for fast comparisons.
pub type ScopeId = Spur;

/// String interner for scope values, enabling O(1) comparisons.
pub type ScopeInterner = Rodeo;

/// (type name, field name) pair identifying a schema field for authorization
/// purposes. Stable for the lifetime of a schema version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCoordinate {
    pub type_name: String,
    pub field_name: String,
}

impl FieldCoordinate {
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: field_name.into(),
        }
    }
}

impl fmt::Display for FieldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.field_name)
    }
}

/// Group of scopes required together (AND logic).
///
/// Example: `["read:employee", "read:private"]` means the caller needs both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeAndGroup(pub(crate) Vec<ScopeId>);

/// Full scope requirement of a field (OR logic between AND groups).
///
/// Example: `[["read:employee", "read:private"], ["read:all"]]` means the
/// caller needs either both employee scopes, or `read:all` alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequiredScopes(pub(crate) Vec<ScopeAndGroup>);

type FieldRulesMap = HashMap<String, HashMap<String, RequiredScopes>>;

/// Errors that can occur during authorization metadata construction.
#[derive(thiserror::Error, Debug)]
pub enum AuthorizationMetadataError {
    #[error("invalid scope requirement for {0}: expected at least one OR group")]
    EmptyRequirement(FieldCoordinate),
    #[error("invalid scope requirement for {0}: empty AND group, expected at least one scope")]
    EmptyAndGroup(FieldCoordinate),
    #[error("duplicate scope requirement for {0}")]
    DuplicateRequirement(FieldCoordinate),
}

/// Pre-computed coordinate → scope requirement map, built once per schema
/// version at startup and immutable afterwards.
#[derive(Debug)]
pub struct AuthorizationMetadata {
    field_rules: FieldRulesMap,
    scopes: ScopeInterner,
}

impl AuthorizationMetadata {
    /// Builds authorization metadata from the coordinate → requirement pairs
    /// supplied by schema tooling. Groups are sorted and deduplicated so that
    /// equal requirements compare equal. Malformed requirements (no groups,
    /// or an empty group) are rejected outright: a requirement that cannot
    /// be evaluated must never grant access.
    pub fn build<I>(requirements: I) -> Result<Self, AuthorizationMetadataError>
    where
        I: IntoIterator<Item = (FieldCoordinate, Vec<Vec<String>>)>,
    {
        let mut field_rules: FieldRulesMap = HashMap::default();
        let mut scopes = ScopeInterner::new();

        for (coordinate, groups) in requirements {
            if groups.is_empty() {
                return Err(AuthorizationMetadataError::EmptyRequirement(coordinate));
            }

            let mut or_groups = Vec::with_capacity(groups.len());
            for group in &groups {
                if group.is_empty() {
                    return Err(AuthorizationMetadataError::EmptyAndGroup(coordinate));
                }

                let mut and_group: Vec<ScopeId> = group
                    .iter()
                    .map(|scope| scopes.get_or_intern(scope))
                    .collect();
                and_group.sort();
                and_group.dedup();
                or_groups.push(ScopeAndGroup(and_group));
            }
            or_groups.sort();
            or_groups.dedup();

            let fields = field_rules.entry(coordinate.type_name.clone()).or_default();
            if fields
                .insert(coordinate.field_name.clone(), RequiredScopes(or_groups))
                .is_some()
            {
                return Err(AuthorizationMetadataError::DuplicateRequirement(coordinate));
            }
        }

        Ok(Self {
            field_rules,
            scopes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.field_rules.is_empty()
    }

    pub fn requirement_for(&self, type_name: &str, field_name: &str) -> Option<&RequiredScopes> {
        self.field_rules
            .get(type_name)
            .and_then(|fields| fields.get(field_name))
    }

    /// Interns the caller's scope set for requirement evaluation. Scopes the
    /// schema never mentions are dropped here, since they can satisfy nothing.
    pub fn scope_ids_for<'a>(
        &self,
        actual_scopes: impl IntoIterator<Item = &'a String>,
    ) -> HashSet<ScopeId> {
        actual_scopes
            .into_iter()
            .filter_map(|scope| self.scopes.get(scope))
            .collect()
    }

    /// Allowed iff at least one AND group is fully contained in the caller's scopes.
    pub fn is_satisfied(&self, requirement: &RequiredScopes, scope_ids: &HashSet<ScopeId>) -> bool {
        requirement.0.iter().any(|and_group| {
            and_group
                .0
                .iter()
                .all(|scope_id| scope_ids.contains(scope_id))
        })
    }

    /// Resolves a requirement back to its literal scope strings, for
    /// error reporting.
    pub fn resolve_groups(&self, requirement: &RequiredScopes) -> Vec<Vec<String>> {
        requirement
            .0
            .iter()
            .map(|and_group| {
                and_group
                    .0
                    .iter()
                    .map(|scope_id| self.scopes.resolve(scope_id).to_string())
                    .collect()
            })
            .collect()
    }
}
