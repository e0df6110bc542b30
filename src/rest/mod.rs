//! JSON endpoints used by the storefront.

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    aggregation::{NewReview, ReviewService},
    error::ReviewError,
    graphql::model::{
        product::ProductRating,
        review::{Rating, Review, ReviewStatus},
    },
    store::{PageRequest, ReviewFilter},
};

/// JSON body extractor answering malformed bodies with a [`ReviewError::Validation`].
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ReviewError))]
pub struct JsonBody<T>(pub T);

/// Builds the router of the REST endpoints.
pub fn router(service: ReviewService) -> Router {
    Router::new()
        .route("/reviews", get(list_reviews).post(create_review))
        .route(
            "/reviews/{id}",
            get(get_review).put(update_review).delete(delete_review),
        )
        .route("/products/{id}/rating", get(get_product_rating))
        .route(
            "/products/{id}/rating/reconcile",
            post(reconcile_product_rating),
        )
        .with_state(service)
}

/// Review as returned to the storefront.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Option<Uuid>,
    pub rating: i64,
    pub comment: String,
    pub status: Option<ReviewStatus>,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewView {
    fn from(value: Review) -> Self {
        Self {
            id: value._id.into(),
            product_id: value.product_id.into(),
            user_id: value.user_id.map(Uuid::from),
            rating: value.rating.stars(),
            comment: value.comment,
            status: value.status,
            created_at: value.created_at.to_chrono(),
        }
    }
}

/// Rating aggregate as returned to the storefront.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProductRatingView {
    pub id: Uuid,
    pub average_rating: f64,
    pub ratings_count: i64,
}

impl From<ProductRating> for ProductRatingView {
    fn from(value: ProductRating) -> Self {
        Self {
            id: value._id.into(),
            average_rating: value.average_rating,
            ratings_count: value.ratings_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub message: String,
    pub review: ReviewView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewListResponse {
    pub reviews: Vec<ReviewView>,
    pub has_next_page: bool,
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewBody {
    pub product_id: Uuid,
    pub user_id: Option<Uuid>,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewBody {
    pub status: ReviewStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListReviewsParams {
    pub product_id: Option<Uuid>,
    pub status: Option<ReviewStatus>,
    pub first: Option<u32>,
    pub skip: Option<u64>,
}

async fn create_review(
    State(service): State<ReviewService>,
    JsonBody(body): JsonBody<CreateReviewBody>,
) -> Result<impl IntoResponse, ReviewError> {
    let new_review = NewReview {
        product_id: body.product_id.into(),
        user_id: body.user_id.map(bson::Uuid::from),
        rating: Rating::try_from(body.rating)?,
        comment: body.comment,
    };
    let review = service.submit_review(new_review).await?;
    let response = ReviewResponse {
        message: "Review added.".to_string(),
        review: review.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_review(
    State(service): State<ReviewService>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateReviewBody>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let review = service.set_review_status(id.into(), body.status).await?;
    Ok(Json(ReviewResponse {
        message: "Review updated.".to_string(),
        review: review.into(),
    }))
}

async fn delete_review(
    State(service): State<ReviewService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewResponse>, ReviewError> {
    let review = service.delete_review(id.into()).await?;
    Ok(Json(ReviewResponse {
        message: "Review deleted.".to_string(),
        review: review.into(),
    }))
}

async fn get_review(
    State(service): State<ReviewService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewView>, ReviewError> {
    let id = bson::Uuid::from(id);
    match service.review(id).await? {
        Some(review) => Ok(Json(review.into())),
        None => Err(ReviewError::ReviewNotFound(id)),
    }
}

async fn list_reviews(
    State(service): State<ReviewService>,
    Query(params): Query<ListReviewsParams>,
) -> Result<Json<ReviewListResponse>, ReviewError> {
    let filter = ReviewFilter {
        product_id: params.product_id.map(bson::Uuid::from),
        status: params.status,
    };
    let page = PageRequest {
        first: params.first,
        skip: params.skip,
        ..Default::default()
    };
    let review_page = service.reviews(filter, page).await?;
    Ok(Json(ReviewListResponse {
        reviews: review_page.nodes.into_iter().map(ReviewView::from).collect(),
        has_next_page: review_page.has_next_page,
        total_count: review_page.total_count,
    }))
}

async fn get_product_rating(
    State(service): State<ReviewService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductRatingView>, ReviewError> {
    let id = bson::Uuid::from(id);
    match service.product(id).await? {
        Some(product) => Ok(Json(product.into())),
        None => Err(ReviewError::ProductNotFound(id)),
    }
}

async fn reconcile_product_rating(
    State(service): State<ReviewService>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductRatingView>, ReviewError> {
    let product = service.reconcile_product(id.into()).await?;
    Ok(Json(product.into()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{
        aggregation::AggregationPolicy,
        store::memory::{InMemoryProductStore, InMemoryReviewStore},
    };

    use super::*;

    fn app(policy: AggregationPolicy) -> (Router, InMemoryProductStore) {
        let products = InMemoryProductStore::new();
        let service = ReviewService::new(
            Arc::new(InMemoryReviewStore::new()),
            Arc::new(products.clone()),
            policy,
            8,
        );
        (router(service), products)
    }

    fn seeded_product(products: &InMemoryProductStore) -> Uuid {
        let product_id = bson::Uuid::new();
        products.seed(ProductRating::from(product_id));
        product_id.into()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn post_review(app: &Router, review: Value) -> (StatusCode, Value) {
        send(app, "POST", "/reviews", Some(review)).await
    }

    async fn product_rating(app: &Router, product_id: Uuid) -> Value {
        let uri = format!("/products/{}/rating", product_id);
        let (status, body) = send(app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    #[tokio::test]
    async fn post_review_counts_rating_immediately() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);

        let (status, body) = post_review(
            &app,
            json!({
                "product_id": product_id,
                "user_id": Uuid::new_v4(),
                "rating": 5,
                "comment": "Great"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "Review added.");
        assert_eq!(body["review"]["rating"], 5);
        assert_eq!(body["review"]["comment"], "Great");

        let rating = product_rating(&app, product_id).await;
        assert_eq!(rating["ratings_count"], 1);
        assert_eq!(rating["average_rating"], 5.0);
    }

    #[tokio::test]
    async fn duplicate_review_is_a_conflict() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);
        let review = json!({"product_id": product_id, "user_id": Uuid::new_v4(), "rating": 4});

        let (status, _) = post_review(&app, review.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = post_review(&app, review).await;

        assert_eq!(status, StatusCode::CONFLICT);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("already written a review"));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_a_bad_request() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);

        let (status, body) =
            post_review(&app, json!({"product_id": product_id, "rating": 6})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
        let product = products.snapshot(product_id.into()).unwrap();
        assert_eq!(product.ratings_count, 0);
    }

    #[tokio::test]
    async fn non_integer_rating_is_a_bad_request_with_message() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);

        for rating in [json!(4.5), json!("5"), Value::Null] {
            let (status, body) =
                post_review(&app, json!({"product_id": product_id, "rating": rating})).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["message"].is_string());
        }
        let product = products.snapshot(product_id.into()).unwrap();
        assert_eq!(product.ratings_count, 0);
    }

    #[tokio::test]
    async fn unknown_status_is_a_bad_request() {
        let (app, _) = app(AggregationPolicy::CountOnApprove);
        let uri = format!("/reviews/{}", Uuid::new_v4());

        let (status, body) = send(&app, "PUT", &uri, Some(json!({"status": "HIDDEN"}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn review_of_missing_product_is_not_found() {
        let (app, _) = app(AggregationPolicy::CountOnSubmit);
        let (status, _) =
            post_review(&app, json!({"product_id": Uuid::new_v4(), "rating": 3})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_approves_pending_review() {
        let (app, products) = app(AggregationPolicy::CountOnApprove);
        let product_id = seeded_product(&products);
        let (_, body) = post_review(&app, json!({"product_id": product_id, "rating": 2})).await;
        assert_eq!(body["review"]["status"], "PENDING");
        let id = body["review"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/reviews/{}", id),
            Some(json!({"status": "APPROVED"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["review"]["status"], "APPROVED");
        let rating = product_rating(&app, product_id).await;
        assert_eq!(rating["ratings_count"], 1);
        assert_eq!(rating["average_rating"], 2.0);
    }

    #[tokio::test]
    async fn put_on_missing_review_is_not_found() {
        let (app, _) = app(AggregationPolicy::CountOnApprove);
        let (status, _) = send(
            &app,
            "PUT",
            &format!("/reviews/{}", Uuid::new_v4()),
            Some(json!({"status": "APPROVED"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_filters_by_product_and_pages() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);
        let other_product_id = seeded_product(&products);
        for rating in [1, 2, 3] {
            post_review(&app, json!({"product_id": product_id, "rating": rating})).await;
        }
        post_review(&app, json!({"product_id": other_product_id, "rating": 5})).await;

        let (status, body) = send(
            &app,
            "GET",
            &format!("/reviews?product_id={}&first=2", product_id),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_count"], 3);
        assert_eq!(body["has_next_page"], true);
        assert_eq!(body["reviews"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn list_hides_pending_reviews_unless_asked_for() {
        let (app, products) = app(AggregationPolicy::CountOnApprove);
        let product_id = seeded_product(&products);
        let (_, body) = post_review(&app, json!({"product_id": product_id, "rating": 4})).await;
        post_review(&app, json!({"product_id": product_id, "rating": 1})).await;
        let id = body["review"]["id"].as_str().unwrap().to_string();
        let uri = format!("/reviews/{}", id);
        send(&app, "PUT", &uri, Some(json!({"status": "APPROVED"}))).await;

        let uri = format!("/reviews?product_id={}", product_id);
        let (_, visible) = send(&app, "GET", &uri, None).await;
        let (_, pending) = send(&app, "GET", &format!("{}&status=PENDING", uri), None).await;

        assert_eq!(visible["total_count"], 1);
        assert_eq!(visible["reviews"][0]["id"], id);
        assert_eq!(pending["total_count"], 1);
        assert_eq!(pending["reviews"][0]["rating"], 1);
    }

    #[tokio::test]
    async fn delete_recomputes_rating() {
        let (app, products) = app(AggregationPolicy::CountOnSubmit);
        let product_id = seeded_product(&products);
        let (_, body) = post_review(&app, json!({"product_id": product_id, "rating": 1})).await;
        post_review(&app, json!({"product_id": product_id, "rating": 5})).await;
        let id = body["review"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "DELETE", &format!("/reviews/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);

        let rating = product_rating(&app, product_id).await;
        assert_eq!(rating["ratings_count"], 1);
        assert_eq!(rating["average_rating"], 5.0);
        let (status, _) = send(&app, "GET", &format!("/reviews/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
