use async_graphql::SimpleObject;

use crate::store::ReviewPage;

use super::review::Review;

/// A connection of reviews.
#[derive(Debug, SimpleObject, Clone)]
#[graphql(shareable)]
pub struct ReviewConnection {
    /// The resulting entities.
    pub nodes: Vec<Review>,
    /// Whether this connection has a next page.
    pub has_next_page: bool,
    /// The total amount of items in this connection.
    pub total_count: u64,
}

impl From<ReviewPage> for ReviewConnection {
    fn from(value: ReviewPage) -> Self {
        Self {
            nodes: value.nodes,
            has_next_page: value.has_next_page,
            total_count: value.total_count,
        }
    }
}
