use crate::export::ExportError;
use crate::session::SessionError;
use crate::storage::StoreError;
use axum::http::StatusCode;
use tracing::error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        error!("backend error: {err}");
        let status = match err {
            StoreError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StoreError::TableMissing(_) | StoreError::Permission(_) => StatusCode::BAD_GATEWAY,
            StoreError::Io(_) | StoreError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        let status = match err {
            ExportError::NothingToExport => StatusCode::UNPROCESSABLE_ENTITY,
            ExportError::ReportNotFound(_) => StatusCode::NOT_FOUND,
            ExportError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ExportError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidSecret => Self::unauthorized(err.to_string()),
            SessionError::Storage(_) => Self::internal(err),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
