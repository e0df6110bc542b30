use async_graphql::InputObject;
use bson::Uuid;

use super::model::review::{Rating, ReviewStatus};

#[derive(InputObject)]
pub struct CreateReviewInput {
    /// UUID of product in review.
    pub product_id: Uuid,
    /// UUID of user owning the review, omitted for guest reviews.
    pub user_id: Option<Uuid>,
    /// Rating of review in 1-5 stars.
    pub rating: Rating,
    /// Free text of review.
    #[graphql(default)]
    pub comment: String,
}

#[derive(InputObject)]
pub struct UpdateReviewStatusInput {
    /// UUID of review to update.
    pub id: Uuid,
    /// New moderation status of review.
    pub status: ReviewStatus,
}
