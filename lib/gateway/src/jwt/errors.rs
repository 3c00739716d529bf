use http::StatusCode;

#[derive(Debug, thiserror::Error, Clone)]
pub enum LookupError {
    #[error("failed to locate the token in the incoming request")]
    LookupFailed,
    #[error("prefix does not match the found value")]
    MismatchedPrefix,
    #[error("failed to convert header to string")]
    FailedToStringifyHeader,
}

#[derive(Debug, thiserror::Error, Clone)]
pub enum JwtError {
    #[error("jwt header lookup failed: {0}")]
    LookupFailed(LookupError),
    #[error("failed to parse JWT header: {0}")]
    InvalidJwtHeader(jsonwebtoken::errors::Error),
    #[error("failed to decode JWK: {0}")]
    InvalidDecodingKey(jsonwebtoken::errors::Error),
    #[error("token is not supported by any of the configured key sets")]
    FailedToLocateKey,
    #[error("jwk algorithm is not supported: {0}")]
    JwkAlgorithmNotSupported(jsonwebtoken::errors::Error),
    #[error("failed to decode token: {0}")]
    FailedToDecodeToken(jsonwebtoken::errors::Error),
    #[error("all keys failed to decode token: {0:?}")]
    AllKeysFailedToDecode(Vec<JwtError>),
}

impl JwtError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JwtError::LookupFailed(_) => StatusCode::UNAUTHORIZED,
            JwtError::JwkAlgorithmNotSupported(_) => StatusCode::BAD_REQUEST,
            JwtError::AllKeysFailedToDecode(_)
            | JwtError::InvalidJwtHeader(_)
            | JwtError::InvalidDecodingKey(_)
            | JwtError::FailedToLocateKey
            | JwtError::FailedToDecodeToken(_) => StatusCode::FORBIDDEN,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            JwtError::AllKeysFailedToDecode(_) => "INVALID_JWT",
            JwtError::FailedToDecodeToken(_) => "INVALID_JWT",
            JwtError::FailedToLocateKey => "JWT_NOT_SUPPORTED",
            JwtError::InvalidJwtHeader(_) => "INVALID_JWT_HEADER",
            JwtError::InvalidDecodingKey(_) => "INTERNAL_SERVER_ERROR",
            JwtError::JwkAlgorithmNotSupported(_) => "JWK_ALGORITHM_NOT_SUPPORTED",
            JwtError::LookupFailed(_) => "JWT_LOOKUP_FAILED",
        }
    }
}
