//! Request failure taxonomy and its mapping onto client responses.

use reqwest::StatusCode;

use crate::archive::ArchiveError;
use crate::http::request::RequestError;
use crate::http::target::TargetError;
use crate::source::FetchError;

/// Everything that can end a request early.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    MissingTarget(#[from] TargetError),

    #[error("bad request: {0}")]
    BadRequest(#[source] RequestError),

    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("method {0} is not supported")]
    UnsupportedMethod(String),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    ArchiveFormat(#[from] ArchiveError),

    #[error("reading local file failed: {0}")]
    LocalRead(#[source] std::io::Error),

    #[error("archive scratch storage failed: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("client connection lost: {0}")]
    ConnectionAbort(#[source] std::io::Error),
}

impl From<RequestError> for GatewayError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::TooLarge { limit } => Self::HeadTooLarge { limit },
            other => Self::BadRequest(other),
        }
    }
}

impl GatewayError {
    /// Status code answered to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingTarget(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::HeadTooLarge { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            Self::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Fetch(e) => e
                .origin_status()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or(StatusCode::NOT_FOUND),
            Self::ArchiveFormat(_)
            | Self::LocalRead(_)
            | Self::Scratch(_)
            | Self::ConnectionAbort(_) => StatusCode::NOT_FOUND,
        }
    }

    /// False when the client is gone and nothing can be answered.
    pub fn is_answerable(&self) -> bool {
        !matches!(self, Self::ConnectionAbort(_))
    }

    /// Body text for the error response.
    pub fn client_message(&self, target: &str) -> String {
        match self {
            Self::Fetch(FetchError::NotAbsolute(_))
            | Self::LocalRead(_)
            | Self::Scratch(_)
            | Self::ArchiveFormat(ArchiveError::Worker(_)) => generic_message(target),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    generic_message(target)
                } else {
                    message
                }
            }
        }
    }
}

fn generic_message(target: &str) -> String {
    format!("Problem with accessing file: {target}")
}
