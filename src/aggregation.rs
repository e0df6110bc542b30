use std::sync::Arc;

use bson::Uuid;
use clap::ValueEnum;
use log::{debug, error, info, warn};

use crate::{
    error::ReviewError,
    graphql::model::{
        product::ProductRating,
        review::{Rating, Review, ReviewStatus},
    },
    rating::RatingSummary,
    store::{PageRequest, ProductStore, ReviewFilter, ReviewPage, ReviewStore, StoreError},
};

/// Decides which reviews count towards the rating of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AggregationPolicy {
    /// Every review counts as soon as it is submitted.
    CountOnSubmit,
    /// Reviews are submitted as pending and only count once approved.
    CountOnApprove,
}

impl AggregationPolicy {
    /// Status a freshly submitted review starts with.
    pub fn initial_status(self) -> Option<ReviewStatus> {
        match self {
            AggregationPolicy::CountOnSubmit => None,
            AggregationPolicy::CountOnApprove => Some(ReviewStatus::Pending),
        }
    }

    /// Status restricting the counted (and publicly visible) reviews, `None` means all.
    pub fn counted_status(self) -> Option<ReviewStatus> {
        match self {
            AggregationPolicy::CountOnSubmit => None,
            AggregationPolicy::CountOnApprove => Some(ReviewStatus::Approved),
        }
    }

    pub fn counts(self, review: &Review) -> bool {
        self.counted_status()
            .is_none_or(|status| review.status == Some(status))
    }
}

/// Review submitted by a user.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: Uuid,
    pub user_id: Option<Uuid>,
    pub rating: Rating,
    pub comment: String,
}

/// Creates and moderates reviews and keeps the rating aggregates of products consistent with them.
///
/// Aggregate writes are compare-and-set on the product version and retried on conflict,
/// so concurrent submissions or approvals never lose an update.
#[derive(Clone)]
pub struct ReviewService {
    reviews: Arc<dyn ReviewStore>,
    products: Arc<dyn ProductStore>,
    policy: AggregationPolicy,
    max_attempts: u32,
}

impl ReviewService {
    /// * `max_attempts` - Compare-and-set attempts per aggregate write, at least one is made.
    pub fn new(
        reviews: Arc<dyn ReviewStore>,
        products: Arc<dyn ProductStore>,
        policy: AggregationPolicy,
        max_attempts: u32,
    ) -> Self {
        Self {
            reviews,
            products,
            policy,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Submits a review.
    ///
    /// Under [`AggregationPolicy::CountOnSubmit`] the rating is counted right away. If that fails
    /// the review is removed again and the aggregate rebuilt without it.
    pub async fn submit_review(&self, input: NewReview) -> Result<Review, ReviewError> {
        let product = self.load_product(input.product_id).await?;
        if let Some(user_id) = input.user_id {
            if self
                .reviews
                .find_by_product_and_user(input.product_id, user_id)
                .await?
                .is_some()
            {
                return Err(ReviewError::DuplicateReview {
                    product_id: input.product_id,
                    user_id,
                });
            }
        }
        let review = Review::new(
            input.product_id,
            input.user_id,
            input.rating,
            input.comment,
            self.policy.initial_status(),
        );
        match self.reviews.insert(review.clone()).await {
            Ok(_) => {}
            Err(StoreError::DuplicateKey) => {
                return Err(match input.user_id {
                    Some(user_id) => ReviewError::DuplicateReview {
                        product_id: input.product_id,
                        user_id,
                    },
                    None => StoreError::DuplicateKey.into(),
                });
            }
            Err(error) => return Err(error.into()),
        }
        info!(
            "Review `{}` submitted for product `{}`.",
            review._id, review.product_id
        );
        if self.policy == AggregationPolicy::CountOnSubmit {
            if let Err(error) = self.count_submitted(product, review.rating).await {
                self.discard(&review).await;
                return Err(error);
            }
        }
        Ok(review)
    }

    /// Approves a pending review and recomputes the rating of its product.
    ///
    /// Approving an already approved review only repeats the recomputation.
    pub async fn approve_review(&self, id: Uuid) -> Result<Review, ReviewError> {
        self.set_review_status(id, ReviewStatus::Approved).await
    }

    /// Moves a review to `status` and recomputes the rating of its product from all counted
    /// reviews.
    pub async fn set_review_status(
        &self,
        id: Uuid,
        status: ReviewStatus,
    ) -> Result<Review, ReviewError> {
        if self.policy == AggregationPolicy::CountOnSubmit {
            return Err(ReviewError::ModerationDisabled);
        }
        let review = self
            .reviews
            .update_status(id, status)
            .await?
            .ok_or(ReviewError::ReviewNotFound(id))?;
        info!("Review `{}` is now {}.", id, status.as_str());
        self.recompute_rating(review.product_id).await?;
        Ok(review)
    }

    /// Deletes a review, recomputing the rating of its product if the review was counted.
    pub async fn delete_review(&self, id: Uuid) -> Result<Review, ReviewError> {
        let review = self
            .reviews
            .delete(id)
            .await?
            .ok_or(ReviewError::ReviewNotFound(id))?;
        info!("Review `{}` deleted.", id);
        if self.policy.counts(&review) {
            match self.recompute_rating(review.product_id).await {
                Ok(_) => {}
                Err(ReviewError::ProductNotFound(product_id)) => {
                    warn!(
                        "Product `{}` of deleted review `{}` no longer exists.",
                        product_id, id
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Ok(review)
    }

    /// Rebuilds the rating of a product from its counted reviews.
    ///
    /// Safe to run at any time, repairs aggregates left stale by external edits or crashes.
    pub async fn reconcile_product(&self, product_id: Uuid) -> Result<ProductRating, ReviewError> {
        self.recompute_rating(product_id).await
    }

    /// Registers a product created by the catalog, returns `false` if it was already known.
    pub async fn register_product(&self, product_id: Uuid) -> Result<bool, ReviewError> {
        let created = self.products.create_if_absent(product_id).await?;
        if created {
            info!("Registered product `{}`.", product_id);
        }
        Ok(created)
    }

    pub async fn product(&self, product_id: Uuid) -> Result<Option<ProductRating>, ReviewError> {
        Ok(self.products.get(product_id).await?)
    }

    pub async fn review(&self, id: Uuid) -> Result<Option<Review>, ReviewError> {
        Ok(self.reviews.find_by_id(id).await?)
    }

    /// Lists reviews, only the counted ones unless a status is asked for explicitly.
    pub async fn reviews(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<ReviewPage, ReviewError> {
        let filter = ReviewFilter {
            status: filter.status.or(self.policy.counted_status()),
            ..filter
        };
        Ok(self.reviews.page(filter, page).await?)
    }

    async fn load_product(&self, product_id: Uuid) -> Result<ProductRating, ReviewError> {
        self.products
            .get(product_id)
            .await?
            .ok_or(ReviewError::ProductNotFound(product_id))
    }

    /// Counts the rating of a review inserted after `product` was read.
    ///
    /// The rating is folded into `product` only if the aggregate is still at that version.
    /// Otherwise another write may already have seen the review, so the aggregate is rebuilt
    /// from the stored reviews instead of folding the rating in a second time.
    async fn count_submitted(
        &self,
        product: ProductRating,
        rating: Rating,
    ) -> Result<ProductRating, ReviewError> {
        let summary = RatingSummary::from(&product).with_rating(rating);
        if self
            .products
            .compare_and_set(product._id, product.version, summary)
            .await?
        {
            return Ok(self.written(product, summary));
        }
        debug!(
            "Rating of product `{}` changed during submission, recomputing.",
            product._id
        );
        self.recompute_rating(product._id).await
    }

    /// Replaces the stored aggregate with one computed from all counted reviews.
    ///
    /// The version is read before the reviews, so a write based on an outdated set of reviews
    /// loses the compare-and-set and is redone.
    async fn recompute_rating(&self, product_id: Uuid) -> Result<ProductRating, ReviewError> {
        for attempt in 1..=self.max_attempts {
            let product = self.load_product(product_id).await?;
            let counted = self
                .reviews
                .find_by_product(product_id, self.policy.counted_status())
                .await?;
            let summary = RatingSummary::from_ratings(counted.iter().map(|review| review.rating));
            if self
                .products
                .compare_and_set(product_id, product.version, summary)
                .await?
            {
                return Ok(self.written(product, summary));
            }
            debug!(
                "Rating of product `{}` changed concurrently, attempt {} of {}.",
                product_id, attempt, self.max_attempts
            );
        }
        Err(ReviewError::ConcurrentUpdate {
            product_id,
            attempts: self.max_attempts,
        })
    }

    fn written(&self, product: ProductRating, summary: RatingSummary) -> ProductRating {
        info!(
            "Rating of product `{}` is {} over {} reviews.",
            product._id, summary.average_rating, summary.ratings_count
        );
        product.with_summary(summary)
    }

    /// Removes a review whose rating could not be counted.
    ///
    /// A failed write may still have reached the database, so the aggregate is rebuilt
    /// afterwards. If that fails too, the product is left for reconciliation.
    async fn discard(&self, review: &Review) {
        match self.reviews.delete(review._id).await {
            Ok(_) => warn!(
                "Removed review `{}` again, its rating could not be counted.",
                review._id
            ),
            Err(error) => {
                error!(
                    "Review `{}` is stored but not counted, removing it failed: {}",
                    review._id, error
                );
                return;
            }
        }
        if let Err(error) = self.recompute_rating(review.product_id).await {
            error!(
                "Rating of product `{}` may be stale, reconcile it: {}",
                review.product_id, error
            );
        }
    }
}
