use tandem_core::error::CoreError;
use tandem_core::protocol::{ErrorCode, ServerMessage};
use tandem_core::types::DbId;
use tandem_db::StoreError;

/// Failures of a collaboration operation.
///
/// Every variant except the two handshake errors is reported to the
/// originating connection as an `error` frame; none of them close it.
#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Page {0} not found")]
    PageNotFound(DbId),

    #[error("Page {0} has no draft to publish")]
    NoDraft(DbId),

    #[error("{0}")]
    InvalidColor(String),

    #[error("Page {0} is open in a newer connection; join again to continue")]
    Superseded(DbId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CollabResult<T> = Result<T, CollabError>;

impl From<CoreError> for CollabError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidColor(msg) => Self::InvalidColor(msg),
            CoreError::Forbidden(msg) => Self::Forbidden(msg),
            CoreError::Unauthorized(_) => Self::InvalidToken,
            CoreError::NotFound { entity: "page", id } => Self::PageNotFound(id),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}

impl CollabError {
    /// Wire code for this error. Storage failures take `transient`, the
    /// code of the operation that was running.
    pub fn code(&self, transient: ErrorCode) -> ErrorCode {
        match self {
            Self::AuthRequired | Self::InvalidToken | Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Self::PageNotFound(_) | Self::Store(StoreError::NotFound { entity: "page", .. }) => {
                ErrorCode::PageNotFound
            }
            Self::NoDraft(_) => ErrorCode::NoDraft,
            Self::InvalidColor(_) => ErrorCode::InvalidColor,
            Self::Superseded(_) => ErrorCode::JoinError,
            Self::Store(_) => transient,
        }
    }

    /// Build the `error` frame sent back to the client.
    ///
    /// Storage error details stay in the server log.
    pub fn to_frame(&self, transient: ErrorCode) -> ServerMessage {
        let code = self.code(transient);
        let message = match self {
            Self::Store(StoreError::NotFound { entity: "page", id }) => format!("Page {id} not found"),
            Self::Store(_) => "A storage error occurred".to_string(),
            other => other.to_string(),
        };
        ServerMessage::error(code, message)
    }
}
