use axum::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;

use crate::bail_service;
use crate::error::ServiceError;

/// JSON body extractor that rejects anything not matching `T` with a 422.
///
/// A body without any `Content-Type` is still parsed as JSON, a non-JSON content type is
/// rejected. Buffering failures such as an oversized body keep their own status.
pub(crate) struct ValidJson<T>(pub(crate) T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let parsed = if req.headers().contains_key(CONTENT_TYPE) {
            Json::<T>::from_request(req, state).await
        } else {
            let bytes = match Bytes::from_request(req, state).await {
                Ok(bytes) => bytes,
                Err(rejection) => bail_service!(rejection.status(), rejection.body_text()),
            };
            Json::<T>::from_bytes(&bytes)
        };

        match parsed {
            Ok(Json(value)) => Ok(ValidJson(value)),
            Err(JsonRejection::BytesRejection(rejection)) => {
                bail_service!(rejection.status(), rejection.body_text())
            }
            Err(rejection) => bail_service!(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text()),
        }
    }
}
