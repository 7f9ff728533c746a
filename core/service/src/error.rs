use thiserror::Error;

/// Errors surfaced by the pool engine.
///
/// Persistence failures are recovered locally (logged, never fatal to a
/// request); generation errors reach a caller only when a synchronous
/// shortfall is being served.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("parameter generation timed out")]
    GenerationTimeout,

    #[error("parameter generation failed: {0}")]
    GenerationFailure(String),

    #[error("pool persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("operation cancelled by shutdown")]
    Cancelled,
}

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            Error::Cancelled => tonic::Status::cancelled("service is shutting down"),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_per_kind() {
        let status = tonic::Status::from(Error::InvalidArgument("count too large".to_string()));
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = tonic::Status::from(Error::Cancelled);
        assert_eq!(status.code(), tonic::Code::Cancelled);

        let status = tonic::Status::from(Error::GenerationTimeout);
        assert_eq!(status.code(), tonic::Code::Internal);

        let status = tonic::Status::from(Error::GenerationFailure("entropy".to_string()));
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
