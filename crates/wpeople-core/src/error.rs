use thiserror::Error;

/// Coarse classification of a failure, for callers that only need to know
/// which kind of message to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    RequestFailed,
    Decoding,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::RequestFailed => "request_failed",
            Self::Decoding => "decoding",
        }
    }
}

#[derive(Debug, Error)]
pub enum WPeopleError {
    #[error("config error: {0}")]
    Config(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("client secret not found")]
    CredentialsNotFound,
    #[error("file token not found")]
    TokenNotFound,
    #[error("token invalid, please renew token")]
    TokenInvalid,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("http error ({status}): {body}")]
    Http { status: u16, body: String },
    #[error("decoding error: {0}")]
    Decode(String),
}

impl WPeopleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::MissingArgument(_)
            | Self::CredentialsNotFound
            | Self::TokenNotFound
            | Self::TokenInvalid
            | Self::Storage(_)
            | Self::Unauthorized
            | Self::StateMismatch
            | Self::InvalidRequest(_) => ErrorKind::Configuration,
            Self::Request(_) | Self::Http { .. } => ErrorKind::RequestFailed,
            Self::Decode(_) => ErrorKind::Decoding,
        }
    }
}

pub type Result<T> = std::result::Result<T, WPeopleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_errors_are_configuration_errors() {
        assert_eq!(WPeopleError::TokenNotFound.kind(), ErrorKind::Configuration);
        assert_eq!(WPeopleError::TokenInvalid.kind(), ErrorKind::Configuration);
        assert_eq!(
            WPeopleError::MissingArgument("client_id").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(WPeopleError::StateMismatch.kind(), ErrorKind::Configuration);
        assert_eq!(
            WPeopleError::InvalidRequest("missing field `phone`".to_string()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_http_errors_are_request_failures() {
        let err = WPeopleError::Http {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::RequestFailed);
        assert_eq!(err.to_string(), "http error (403): forbidden");
    }
}
