//! In-memory stores standing in for MongoDB in tests.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use bson::Uuid;

use crate::{
    graphql::model::{
        order_datatypes::{OrderDirection, ReviewOrderField},
        product::ProductRating,
        review::{Review, ReviewStatus},
    },
    rating::RatingSummary,
};

use super::{
    PageRequest, ProductStore, ReviewFilter, ReviewPage, ReviewStore, StoreError, StoreFuture,
};

/// HashMap-based review store enforcing the (product, user) uniqueness on insert.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReviewStore {
    reviews: Arc<RwLock<HashMap<Uuid, Review>>>,
}

impl InMemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reviews.read().unwrap().len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.reviews.read().unwrap().keys().copied().collect()
    }

    pub fn get(&self, id: Uuid) -> Option<Review> {
        self.reviews.read().unwrap().get(&id).cloned()
    }
}

fn matches(filter: &ReviewFilter, review: &Review) -> bool {
    filter.product_id.is_none_or(|product_id| review.product_id == product_id)
        && filter.status.is_none_or(|status| review.status == Some(status))
}

impl ReviewStore for InMemoryReviewStore {
    fn insert(&self, review: Review) -> StoreFuture<'_, Uuid> {
        Box::pin(async move {
            let mut reviews = self.reviews.write().unwrap();
            let taken = review.user_id.is_some()
                && reviews.values().any(|existing| {
                    existing.product_id == review.product_id && existing.user_id == review.user_id
                });
            if taken || reviews.contains_key(&review._id) {
                return Err(StoreError::DuplicateKey);
            }
            let id = review._id;
            reviews.insert(id, review);
            Ok(id)
        })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move { Ok(self.get(id)) })
    }

    fn find_by_product_and_user(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            Ok(self
                .reviews
                .read()
                .unwrap()
                .values()
                .find(|review| review.product_id == product_id && review.user_id == Some(user_id))
                .cloned())
        })
    }

    fn find_by_product(
        &self,
        product_id: Uuid,
        status: Option<ReviewStatus>,
    ) -> StoreFuture<'_, Vec<Review>> {
        Box::pin(async move {
            let filter = ReviewFilter {
                product_id: Some(product_id),
                status,
            };
            Ok(self
                .reviews
                .read()
                .unwrap()
                .values()
                .filter(|review| matches(&filter, review))
                .cloned()
                .collect())
        })
    }

    fn update_status(&self, id: Uuid, status: ReviewStatus) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            let mut reviews = self.reviews.write().unwrap();
            Ok(reviews.get_mut(&id).map(|review| {
                review.status = Some(status);
                review.clone()
            }))
        })
    }

    fn delete(&self, id: Uuid) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move { Ok(self.reviews.write().unwrap().remove(&id)) })
    }

    fn page(&self, filter: ReviewFilter, page: PageRequest) -> StoreFuture<'_, ReviewPage> {
        Box::pin(async move {
            let mut nodes: Vec<Review> = self
                .reviews
                .read()
                .unwrap()
                .values()
                .filter(|review| matches(&filter, review))
                .cloned()
                .collect();
            match page.order_by.field.unwrap_or_default() {
                ReviewOrderField::Id => nodes.sort_by_key(|review| review._id.bytes()),
                ReviewOrderField::Rating => nodes.sort_by_key(|review| review.rating.stars()),
                ReviewOrderField::CreatedAt => nodes.sort_by_key(|review| review.created_at),
            }
            if page.order_by.direction.unwrap_or_default() == OrderDirection::Desc {
                nodes.reverse();
            }
            let total_count = nodes.len() as u64;
            let skip = page.skip.unwrap_or(0) as usize;
            let limit = page.first.map_or(usize::MAX, |first| first as usize);
            let nodes: Vec<Review> = nodes.into_iter().skip(skip).take(limit).collect();
            let has_next_page = (skip + nodes.len()) < total_count as usize;
            Ok(ReviewPage {
                nodes,
                has_next_page,
                total_count,
            })
        })
    }
}

/// HashMap-based product aggregate store with versioned writes.
#[derive(Clone, Debug, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<Uuid, ProductRating>>>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a product as the catalog would, bypassing version checks.
    pub fn seed(&self, product: ProductRating) {
        self.products.write().unwrap().insert(product._id, product);
    }

    pub fn snapshot(&self, product_id: Uuid) -> Option<ProductRating> {
        self.products.read().unwrap().get(&product_id).cloned()
    }
}

impl ProductStore for InMemoryProductStore {
    fn get(&self, product_id: Uuid) -> StoreFuture<'_, Option<ProductRating>> {
        Box::pin(async move { Ok(self.snapshot(product_id)) })
    }

    fn compare_and_set(
        &self,
        product_id: Uuid,
        expected_version: i64,
        summary: RatingSummary,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut products = self.products.write().unwrap();
            match products.get_mut(&product_id) {
                Some(product) if product.version == expected_version => {
                    *product = product.with_summary(summary);
                    Ok(true)
                }
                _ => Ok(false),
            }
        })
    }

    fn create_if_absent(&self, product_id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let mut products = self.products.write().unwrap();
            if products.contains_key(&product_id) {
                return Ok(false);
            }
            products.insert(product_id, ProductRating::from(product_id));
            Ok(true)
        })
    }
}
