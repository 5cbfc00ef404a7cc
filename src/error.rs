use crate::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("Sign-in required")]
    AuthRequired,

    #[error("Remote error: {0}")]
    Remote(GatewayError),
}

/// Gateway failures are mapped to structured variants at the service
/// boundary. Nothing downstream inspects error message text.
impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => Error::NotFound,
            GatewayError::Conflict(msg) => Error::Duplicate(msg),
            other => Error::Remote(other),
        }
    }
}

pub type AppResult<T> = Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_duplicate() {
        let err: Error = GatewayError::Conflict("slug taken".into()).into();
        assert!(matches!(err, Error::Duplicate(_)));
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err: Error = GatewayError::NotFound.into();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn other_gateway_errors_stay_remote() {
        let err: Error = GatewayError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, Error::Remote(_)));
    }
}
