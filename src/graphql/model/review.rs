use async_graphql::{Enum, SimpleObject};
use bson::{Bson, Uuid, datetime::DateTime};
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// The review of a product written by a user.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, SimpleObject)]
pub struct Review {
    /// Review UUID.
    pub _id: Uuid,
    /// UUID of the product that the review is about.
    pub product_id: Uuid,
    /// UUID of the user owning the review, absent for guest reviews.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Rating of review in 1-5 stars.
    pub rating: Rating,
    /// Free text of review.
    pub comment: String,
    /// Moderation status, absent when reviews count as soon as they are submitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReviewStatus>,
    /// Timestamp when review was created.
    pub created_at: DateTime,
}

impl Review {
    /// Creates a review with a fresh UUID, stamped with the current time.
    pub fn new(
        product_id: Uuid,
        user_id: Option<Uuid>,
        rating: Rating,
        comment: String,
        status: Option<ReviewStatus>,
    ) -> Self {
        Self {
            _id: Uuid::new(),
            product_id,
            user_id,
            rating,
            comment,
            status,
            created_at: DateTime::now(),
        }
    }
}

/// Rating of a review, stored as its star count.
#[derive(Enum, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Rating {
    OneStars = 1,
    TwoStars = 2,
    ThreeStars = 3,
    FourStars = 4,
    FiveStars = 5,
}

impl Rating {
    /// Number of stars, 1 to 5.
    pub fn stars(self) -> i64 {
        self as i64
    }
}

impl TryFrom<i64> for Rating {
    type Error = ReviewError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::OneStars),
            2 => Ok(Rating::TwoStars),
            3 => Ok(Rating::ThreeStars),
            4 => Ok(Rating::FourStars),
            5 => Ok(Rating::FiveStars),
            _ => Err(ReviewError::Validation(format!(
                "Rating must be an integer between 1 and 5, got `{}`.",
                value
            ))),
        }
    }
}

impl From<Rating> for i64 {
    fn from(value: Rating) -> Self {
        value.stars()
    }
}

/// Moderation status of a review.
#[derive(Enum, Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    /// Waiting for a moderator, not counted.
    Pending,
    /// Released by a moderator, counted towards the product rating.
    Approved,
}

impl ReviewStatus {
    /// Stored representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
        }
    }
}

impl From<ReviewStatus> for Bson {
    fn from(value: ReviewStatus) -> Self {
        Bson::String(value.as_str().to_string())
    }
}
