//! Extractors whose rejections surface as `AppError::InvalidInput`.

use axum::extract::{FromRequest, FromRequestParts, Path};
use axum::Json;

use crate::error::AppError;

#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
