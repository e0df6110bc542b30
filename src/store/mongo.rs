use bson::{Bson, Document, Uuid, doc};
use futures::TryStreamExt;
use log::info;
use mongodb::{
    Collection, Database, IndexModel,
    error::{ErrorKind, WriteError, WriteFailure},
    options::{
        FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument, UpdateOptions,
    },
};
use mongodb_cursor_pagination::{FindResult, PaginatedCursor};

use crate::{
    graphql::model::{
        product::ProductRating,
        review::{Review, ReviewStatus},
    },
    rating::RatingSummary,
};

use super::{
    PageRequest, ProductStore, ReviewFilter, ReviewPage, ReviewStore, StoreError, StoreFuture,
};

/// MongoDB error code of a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Reviews kept in the `reviews` collection.
#[derive(Clone)]
pub struct MongoReviewStore {
    collection: Collection<Review>,
}

impl MongoReviewStore {
    /// Opens the collection and makes sure a user can review a product only once.
    ///
    /// The index is partial, guest reviews without a user are not constrained.
    ///
    /// * `db_client` - MongoDB database client.
    pub async fn new(db_client: &Database) -> Result<Self, StoreError> {
        let collection = db_client.collection::<Review>("reviews");
        let options = IndexOptions::builder()
            .name("product_user_unique".to_string())
            .unique(true)
            .partial_filter_expression(doc! {"user_id": {"$type": "binData"}})
            .build();
        let index = IndexModel::builder()
            .keys(doc! {"product_id": 1, "user_id": 1})
            .options(options)
            .build();
        collection.create_index(index, None).await?;
        info!("Ensured unique (product_id, user_id) index on reviews.");
        Ok(Self { collection })
    }
}

impl ReviewStore for MongoReviewStore {
    fn insert(&self, review: Review) -> StoreFuture<'_, Uuid> {
        Box::pin(async move {
            match self.collection.insert_one(review, None).await {
                Ok(result) => uuid_from_bson(result.inserted_id),
                Err(error) if is_duplicate_key(&error) => Err(StoreError::DuplicateKey),
                Err(error) => Err(error.into()),
            }
        })
    }

    fn find_by_id(&self, id: Uuid) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move { Ok(self.collection.find_one(doc! {"_id": id}, None).await?) })
    }

    fn find_by_product_and_user(
        &self,
        product_id: Uuid,
        user_id: Uuid,
    ) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            let filter = doc! {"product_id": product_id, "user_id": user_id};
            Ok(self.collection.find_one(filter, None).await?)
        })
    }

    fn find_by_product(
        &self,
        product_id: Uuid,
        status: Option<ReviewStatus>,
    ) -> StoreFuture<'_, Vec<Review>> {
        Box::pin(async move {
            let filter = filter_document(&ReviewFilter {
                product_id: Some(product_id),
                status,
            });
            let cursor = self.collection.find(filter, None).await?;
            Ok(cursor.try_collect().await?)
        })
    }

    fn update_status(&self, id: Uuid, status: ReviewStatus) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            let options = FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build();
            let review = self
                .collection
                .find_one_and_update(doc! {"_id": id}, doc! {"$set": {"status": status}}, options)
                .await?;
            Ok(review)
        })
    }

    fn delete(&self, id: Uuid) -> StoreFuture<'_, Option<Review>> {
        Box::pin(async move {
            Ok(self
                .collection
                .find_one_and_delete(doc! {"_id": id}, None)
                .await?)
        })
    }

    fn page(&self, filter: ReviewFilter, page: PageRequest) -> StoreFuture<'_, ReviewPage> {
        Box::pin(async move {
            let review_order = page.order_by;
            let field = review_order.field.unwrap_or_default();
            let direction = i32::from(review_order.direction.unwrap_or_default());
            let sorting_doc = doc! {field.as_str(): direction};
            let find_options = FindOptions::builder()
                .skip(page.skip)
                .limit(page.first.map(|definitely_first| i64::from(definitely_first)))
                .sort(sorting_doc)
                .build();
            let document_collection = self.collection.clone_with_type::<Document>();
            let filter = filter_document(&filter);
            let find_result: FindResult<Review> =
                PaginatedCursor::new(Some(find_options), None, None)
                    .find(&document_collection, Some(&filter))
                    .await
                    .map_err(|error| StoreError::Pagination(format!("{:?}", error)))?;
            Ok(ReviewPage {
                nodes: find_result.items,
                has_next_page: find_result.page_info.has_next_page,
                total_count: find_result.total_count,
            })
        })
    }
}

/// Rating aggregates kept on the documents of the `products` collection.
///
/// Only the derived rating fields are touched, the rest of a product document belongs to the
/// catalog.
#[derive(Clone)]
pub struct MongoProductStore {
    collection: Collection<ProductRating>,
}

impl MongoProductStore {
    pub fn new(db_client: &Database) -> Self {
        Self {
            collection: db_client.collection::<ProductRating>("products"),
        }
    }
}

impl ProductStore for MongoProductStore {
    fn get(&self, product_id: Uuid) -> StoreFuture<'_, Option<ProductRating>> {
        Box::pin(async move {
            Ok(self
                .collection
                .find_one(doc! {"_id": product_id}, None)
                .await?)
        })
    }

    fn compare_and_set(
        &self,
        product_id: Uuid,
        expected_version: i64,
        summary: RatingSummary,
    ) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            // Products created by the catalog have no version yet, which counts as version 0.
            let filter = if expected_version == 0 {
                doc! {"_id": product_id, "version": {"$in": [0_i64, Bson::Null]}}
            } else {
                doc! {"_id": product_id, "version": expected_version}
            };
            let update = doc! {
                "$set": {
                    "average_rating": summary.average_rating,
                    "ratings_count": summary.ratings_count,
                    "ratings_sum": summary.ratings_sum,
                },
                "$inc": {"version": 1_i64},
            };
            let result = self.collection.update_one(filter, update, None).await?;
            Ok(result.matched_count == 1)
        })
    }

    fn create_if_absent(&self, product_id: Uuid) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let update = doc! {
                "$setOnInsert": {
                    "average_rating": 0.0,
                    "ratings_count": 0_i64,
                    "ratings_sum": 0.0,
                    "version": 0_i64,
                }
            };
            let options = UpdateOptions::builder().upsert(true).build();
            let result = self
                .collection
                .update_one(doc! {"_id": product_id}, update, options)
                .await?;
            Ok(result.upserted_id.is_some())
        })
    }
}

/// Builds the MongoDB filter matching `filter`.
fn filter_document(filter: &ReviewFilter) -> Document {
    let mut document = Document::new();
    if let Some(product_id) = filter.product_id {
        document.insert("product_id", product_id);
    }
    if let Some(status) = filter.status {
        document.insert("status", status);
    }
    document
}

/// Extracts UUID from BSON.
///
/// Adding a review returns a UUID in a BSON document. This function helps to extract the UUID.
fn uuid_from_bson(bson: Bson) -> Result<Uuid, StoreError> {
    match bson {
        Bson::Binary(id) => id
            .to_uuid()
            .map_err(|error| StoreError::Malformed(error.to_string())),
        _ => {
            let message = format!(
                "Returned id: `{}` needs to be a Binary in order to be parsed as a Uuid",
                bson
            );
            Err(StoreError::Malformed(message))
        }
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(WriteError {
            code: DUPLICATE_KEY_CODE,
            ..
        }))
    )
}
