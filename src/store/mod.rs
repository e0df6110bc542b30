use std::{future::Future, pin::Pin};

use bson::Uuid;
use thiserror::Error;

use crate::{
    graphql::model::{
        order_datatypes::ReviewOrderInput,
        product::ProductRating,
        review::{Review, ReviewStatus},
    },
    rating::RatingSummary,
};

#[cfg(test)]
pub mod memory;
pub mod mongo;

/// Boxed future returned by store operations, keeps the traits usable as `Arc<dyn _>`.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors raised at the storage boundary.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("MongoDB operation failed: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Document violates a unique index.")]
    DuplicateKey,

    #[error("Paginating reviews failed: {0}")]
    Pagination(String),

    #[error("Stored data is malformed: {0}")]
    Malformed(String),
}

/// Restricts which reviews are listed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReviewFilter {
    pub product_id: Option<Uuid>,
    pub status: Option<ReviewStatus>,
}

/// Page of reviews to retrieve.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRequest {
    pub first: Option<u32>,
    pub skip: Option<u64>,
    pub order_by: ReviewOrderInput,
}

/// One page of reviews.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewPage {
    pub nodes: Vec<Review>,
    pub has_next_page: bool,
    pub total_count: u64,
}

/// Persisted collection of reviews.
pub trait ReviewStore: Send + Sync {
    /// Inserts a review and returns its UUID.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the user already reviewed the product.
    fn insert(&self, review: Review) -> StoreFuture<'_, Uuid>;

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<Review>>;

    fn find_by_product_and_user(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> StoreFuture<'_, Option<Review>>;

    /// All reviews of a product, restricted to `status` if given.
    fn find_by_product(
        &self,
        product_id: Uuid,
        status: Option<ReviewStatus>,
    ) -> StoreFuture<'_, Vec<Review>>;

    /// Sets the status and returns the updated review, `None` if it does not exist.
    fn update_status(&self, id: Uuid, status: ReviewStatus) -> StoreFuture<'_, Option<Review>>;

    /// Removes the review and returns it, `None` if it does not exist.
    fn delete(&self, id: Uuid) -> StoreFuture<'_, Option<Review>>;

    fn page(&self, filter: ReviewFilter, page: PageRequest) -> StoreFuture<'_, ReviewPage>;
}

/// Persisted rating aggregates of products.
pub trait ProductStore: Send + Sync {
    fn get(&self, product_id: Uuid) -> StoreFuture<'_, Option<ProductRating>>;

    /// Writes `summary` only if the stored aggregate is still at `expected_version`,
    /// incrementing the version on success.
    ///
    /// Returns `false` when the version moved on or the product does not exist.
    fn compare_and_set(
        &self,
        product_id: Uuid,
        expected_version: i64,
        summary: RatingSummary,
    ) -> StoreFuture<'_, bool>;

    /// Creates an empty aggregate for a new product, returns `false` if it already existed.
    fn create_if_absent(&self, product_id: Uuid) -> StoreFuture<'_, bool>;
}
