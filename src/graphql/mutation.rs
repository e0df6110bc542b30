use async_graphql::{Context, ErrorExtensions, Object, Result};
use bson::Uuid;

use crate::aggregation::{NewReview, ReviewService};

use super::model::{product::ProductRating, review::Review};
use super::mutation_input_structs::{CreateReviewInput, UpdateReviewStatusInput};

/// Describes GraphQL review mutations.
pub struct Mutation;

#[Object]
impl Mutation {
    /// Adds a review of a product with a rating and a comment.
    ///
    /// Depending on the rating policy the review counts right away or waits for approval.
    async fn create_review<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "CreateReviewInput")] input: CreateReviewInput,
    ) -> Result<Review> {
        let service = ctx.data::<ReviewService>()?;
        let new_review = NewReview {
            product_id: input.product_id,
            user_id: input.user_id,
            rating: input.rating,
            comment: input.comment,
        };
        service
            .submit_review(new_review)
            .await
            .map_err(|error| error.extend())
    }

    /// Approves a review, making it count towards the rating of its product.
    async fn approve_review<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of review to approve.")] id: Uuid,
    ) -> Result<Review> {
        let service = ctx.data::<ReviewService>()?;
        service
            .approve_review(id)
            .await
            .map_err(|error| error.extend())
    }

    /// Updates the moderation status of a review referenced with an UUID.
    async fn update_review_status<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UpdateReviewStatusInput")] input: UpdateReviewStatusInput,
    ) -> Result<Review> {
        let service = ctx.data::<ReviewService>()?;
        service
            .set_review_status(input.id, input.status)
            .await
            .map_err(|error| error.extend())
    }

    /// Deletes review of UUID.
    async fn delete_review<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of review to delete.")] id: Uuid,
    ) -> Result<bool> {
        let service = ctx.data::<ReviewService>()?;
        match service.delete_review(id).await {
            Ok(_) => Ok(true),
            Err(error) => Err(error.extend()),
        }
    }

    /// Recomputes the rating of a product from its reviews.
    async fn reconcile_product_rating<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of product to reconcile.")] product_id: Uuid,
    ) -> Result<ProductRating> {
        let service = ctx.data::<ReviewService>()?;
        service
            .reconcile_product(product_id)
            .await
            .map_err(|error| error.extend())
    }
}
