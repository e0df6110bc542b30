use async_graphql::{ComplexObject, Context, ErrorExtensions, Result, SimpleObject};
use bson::Uuid;
use serde::{Deserialize, Serialize};

use crate::{
    aggregation::ReviewService,
    rating::RatingSummary,
    store::{PageRequest, ReviewFilter},
};

use super::{order_datatypes::ReviewOrderInput, review_connection::ReviewConnection};

/// Rating aggregate of a product.
///
/// Products are owned by the catalog, only the derived rating fields are maintained here.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, SimpleObject)]
#[graphql(name = "Product", complex)]
pub struct ProductRating {
    /// UUID of the product.
    pub _id: Uuid,
    /// Mean rating of the counted reviews rounded to two decimals, `0` if none are counted.
    #[serde(default)]
    pub average_rating: f64,
    /// Number of reviews contributing to the average.
    #[serde(default)]
    pub ratings_count: i64,
    /// Exact sum of counted ratings, missing on products seeded outside of this service.
    #[graphql(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratings_sum: Option<f64>,
    /// Incremented on every aggregate write.
    #[graphql(skip)]
    #[serde(default)]
    pub version: i64,
}

impl ProductRating {
    /// Returns the aggregate as it reads after `summary` was written over this version.
    pub fn with_summary(&self, summary: RatingSummary) -> Self {
        Self {
            _id: self._id,
            average_rating: summary.average_rating,
            ratings_count: summary.ratings_count,
            ratings_sum: Some(summary.ratings_sum),
            version: self.version + 1,
        }
    }
}

#[ComplexObject]
impl ProductRating {
    /// Retrieves the publicly visible reviews of the product.
    async fn reviews<'a>(
        &self,
        ctx: &Context<'a>,
        #[graphql(desc = "Describes that the `first` N reviews should be retrieved.")]
        first: Option<u32>,
        #[graphql(desc = "Describes how many reviews should be skipped at the beginning.")]
        skip: Option<u64>,
        #[graphql(desc = "Specifies the order in which reviews are retrieved.")] order_by: Option<
            ReviewOrderInput,
        >,
    ) -> Result<ReviewConnection> {
        let service = ctx.data::<ReviewService>()?;
        let filter = ReviewFilter {
            product_id: Some(self._id),
            status: service.policy().counted_status(),
        };
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
}

impl From<Uuid> for ProductRating {
    fn from(value: Uuid) -> Self {
        ProductRating {
            _id: value,
            average_rating: 0.0,
            ratings_count: 0,
            ratings_sum: Some(0.0),
            version: 0,
        }
    }
}
