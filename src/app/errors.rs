use crate::semantic::SemanticSearchError;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Semantic(#[from] SemanticSearchError),

    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_side_failures_become_other() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.pdf");
        let err: AppError = anyhow::Error::new(io).context("could not read missing.pdf").into();

        assert!(matches!(err, AppError::Other(_)));
        assert!(err.to_string().contains("could not read missing.pdf"));
    }

    #[test]
    fn test_bad_request_message_is_verbatim() {
        let err = AppError::BadRequest("missing multipart field 'file'".to_string());
        assert_eq!(err.to_string(), "missing multipart field 'file'");
    }
}
