use async_graphql::{Context, ErrorExtensions, Object, Result};
use bson::Uuid;

use crate::{
    aggregation::ReviewService,
    store::{PageRequest, ReviewFilter},
};

use super::model::{
    order_datatypes::ReviewOrderInput,
    product::ProductRating,
    review::{Review, ReviewStatus},
    review_connection::ReviewConnection,
};

/// Describes GraphQL review queries.
pub struct Query;

#[Object]
impl Query {
    /// Entity resolver for product of specific UUID.
    #[graphql(entity)]
    async fn product_entity_resolver<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of product to retrieve.")] id: Uuid,
    ) -> Result<Option<ProductRating>> {
        let service = ctx.data::<ReviewService>()?;
        service.product(id).await.map_err(|error| error.extend())
    }

    /// Retrieves the rating aggregate of a product.
    async fn product_rating<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of product to retrieve.")] id: Uuid,
    ) -> Result<Option<ProductRating>> {
        let service = ctx.data::<ReviewService>()?;
        service.product(id).await.map_err(|error| error.extend())
    }

    /// Retrieves reviews, optionally of a single product.
    ///
    /// Without a status only the reviews counted towards ratings are listed.
    async fn reviews<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of product whose reviews should be retrieved.")]
        product_id: Option<Uuid>,
        #[graphql(desc = "Moderation status of reviews to retrieve.")] status: Option<
            ReviewStatus,
        >,
        #[graphql(desc = "Describes that the `first` N reviews should be retrieved.")]
        first: Option<u32>,
        #[graphql(desc = "Describes how many reviews should be skipped at the beginning.")]
        skip: Option<u64>,
        #[graphql(desc = "Specifies the order in which reviews are retrieved.")] order_by: Option<
            ReviewOrderInput,
        >,
    ) -> Result<ReviewConnection> {
        let service = ctx.data::<ReviewService>()?;
        let filter = ReviewFilter { product_id, status };
        let page = PageRequest {
            first,
            skip,
            order_by: order_by.unwrap_or_default(),
        };
        match service.reviews(filter, page).await {
            Ok(review_page) => Ok(review_page.into()),
            Err(error) => Err(error.extend()),
        }
    }

    /// Retrieves review of specific UUID.
    async fn review<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "UUID of review to retrieve.")] id: Uuid,
    ) -> Result<Option<Review>> {
        let service = ctx.data::<ReviewService>()?;
        service.review(id).await.map_err(|error| error.extend())
    }

    /// Entity resolver for review of specific UUID.
    #[graphql(entity)]
    async fn review_entity_resolver<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(key, desc = "UUID of review to retrieve.")] id: Uuid,
    ) -> Result<Option<Review>> {
        let service = ctx.data::<ReviewService>()?;
        service.review(id).await.map_err(|error| error.extend())
    }
}
