pub mod engine;
pub mod metadata;

pub use engine::{enforce_response_authorization, AuthorizationOutcome};
pub use metadata::{AuthorizationMetadata, AuthorizationMetadataError, FieldCoordinate};
