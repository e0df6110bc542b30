use axum::{Json, Router, extract::State, http::StatusCode, routing::{get, post}};
use bson::Uuid;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::aggregation::ReviewService;

/// Topic on which the catalog announces new products.
const PRODUCT_CREATED_TOPIC: &str = "catalog/product/created";

/// Data to send to Dapr in order to describe a subscription.
#[derive(Serialize, Deserialize, Debug)]
pub struct Pubsub {
    #[serde(rename = "pubsubName")]
    pub pubsubname: String,
    pub topic: String,
    pub route: String,
}

/// Reponse data to send to Dapr when receiving an event.
#[derive(Serialize, Deserialize, Debug)]
pub struct TopicEventResponse {
    pub status: u8,
}

/// Default status is `0` -> Ok, according to Dapr specs.
impl Default for TopicEventResponse {
    fn default() -> Self {
        Self { status: 0 }
    }
}

/// Relevant part of Dapr event wrapped in a cloud envelope.
#[derive(Deserialize, Debug)]
pub struct Event<T> {
    pub topic: String,
    pub data: T,
}

/// Relevant part of Dapr event data.
#[derive(Deserialize, Debug)]
pub struct EventData {
    pub id: Uuid,
}

/// Returns Router that establishes connection to Dapr.
///
/// Adds endpoints to define pub/sub interaction with Dapr.
pub fn router(service: ReviewService) -> Router {
    Router::new()
        .route("/dapr/subscribe", get(list_topic_subscriptions))
        .route("/on-topic-event", post(on_topic_event))
        .with_state(service)
}

/// HTTP endpoint to list topic subsciptions.
pub async fn list_topic_subscriptions() -> Result<Json<Vec<Pubsub>>, StatusCode> {
    let pubsub_product = Pubsub {
        pubsubname: "pubsub".to_string(),
        topic: PRODUCT_CREATED_TOPIC.to_string(),
        route: "/on-topic-event".to_string(),
    };
    Ok(Json(vec![pubsub_product]))
}

/// HTTP endpoint to receive events.
///
/// * `service` - Review service owning the product rating aggregates.
/// * `event` - Event handled by endpoint.
pub async fn on_topic_event(
    State(service): State<ReviewService>,
    Json(event): Json<Event<EventData>>,
) -> Result<Json<TopicEventResponse>, StatusCode> {
    info!("{:?}", event);

    match event.topic.as_str() {
        PRODUCT_CREATED_TOPIC => {
            if let Err(registration_error) = service.register_product(event.data.id).await {
                error!("{}", registration_error);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }
        _ => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
    Ok(Json(TopicEventResponse::default()))
}
