use async_graphql::ErrorExtensions;
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bson::Uuid;
use log::error;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Errors of the review rating operations.
///
/// None of them is retried internally, callers decide how to surface them.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(
        "User of UUID: `{user_id}` has already written a review for product of UUID: `{product_id}`."
    )]
    DuplicateReview { product_id: Uuid, user_id: Uuid },

    #[error("Product with UUID: `{0}` not found.")]
    ProductNotFound(Uuid),

    #[error("Review with UUID: `{0}` not found.")]
    ReviewNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Reviews are counted on submission, moderation is disabled.")]
    ModerationDisabled,

    #[error(
        "Rating of product with UUID: `{product_id}` was modified concurrently {attempts} times in a row."
    )]
    ConcurrentUpdate { product_id: Uuid, attempts: u32 },

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl ReviewError {
    /// Machine readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ReviewError::DuplicateReview { .. } => "DUPLICATE_REVIEW",
            ReviewError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            ReviewError::ReviewNotFound(_) => "REVIEW_NOT_FOUND",
            ReviewError::Validation(_) => "VALIDATION_FAILED",
            ReviewError::ModerationDisabled => "MODERATION_DISABLED",
            ReviewError::ConcurrentUpdate { .. } => "CONCURRENT_UPDATE",
            ReviewError::Storage(_) => "STORAGE_FAILURE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ReviewError::DuplicateReview { .. } => StatusCode::CONFLICT,
            ReviewError::ProductNotFound(_) | ReviewError::ReviewNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ReviewError::Validation(_) => StatusCode::BAD_REQUEST,
            ReviewError::ModerationDisabled | ReviewError::ConcurrentUpdate { .. } => {
                StatusCode::CONFLICT
            }
            ReviewError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ReviewError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ReviewError {
    fn from(rejection: JsonRejection) -> Self {
        ReviewError::Validation(rejection.body_text())
    }
}

impl ErrorExtensions for ReviewError {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, extensions| {
            extensions.set("code", self.code());
        })
    }
}
