use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Failure of a request, split by who is at fault.
///
/// `Rejected` carries the client-facing status chosen at the boundary (bad body, oversized
/// body). `Inference` wraps anything raised past validation and always answers 500.
#[derive(Debug)]
pub enum ServiceError {
    Rejected { status: StatusCode, reason: String },
    Inference(anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Rejected { status, .. } => *status,
            ServiceError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let reason = match self {
            ServiceError::Rejected { reason, .. } => {
                tracing::debug!(%status, "Rejected request: {}", reason);
                reason
            }
            ServiceError::Inference(err) => {
                let reason = format!("{err:#}");
                tracing::error!(%status, "Inference failed: {}", reason);
                reason
            }
        };
        (status, Json(ErrorBody { error: &reason })).into_response()
    }
}

// Anything that reaches `?` after extraction is an inference-side failure.
impl<E> From<E> for ServiceError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        ServiceError::Inference(err.into())
    }
}

pub type ServiceResult<T, E = ServiceError> = Result<T, E>;

#[macro_export]
macro_rules! bail_service {
    ($status:expr, $reason:expr) => {
        return Err($crate::error::ServiceError::Rejected {
            status: $status,
            reason: ($reason).to_string(),
        })
    };
    ($status:expr, $fmt:expr $(, $arg:expr)+) => {
        return Err($crate::error::ServiceError::Rejected {
            status: $status,
            reason: format!($fmt $(, $arg)+),
        })
    };
}
