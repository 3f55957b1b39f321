use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Query, Request,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, request::Parts},
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AttendanceError;

/// JSON body extractor whose rejections use the service error format.
///
/// Oversized bodies become `PayloadTooLarge`; anything else that fails to
/// parse (missing fields, bad data URIs, wrong content type) is a
/// `Validation` error.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AttendanceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(map_rejection(rejection)),
        }
    }
}

fn map_rejection(rejection: JsonRejection) -> AttendanceError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AttendanceError::PayloadTooLarge;
    }
    debug!(status = %rejection.status(), "rejected JSON body");
    AttendanceError::Validation(rejection.body_text())
}

/// Query string extractor; malformed parameters become `Validation` errors.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AttendanceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| AttendanceError::Validation(rejection.body_text()))
    }
}
