use crate::graphql::model::{product::ProductRating, review::Rating};

/// Derived rating fields of a product: rounded average, count and exact sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub ratings_count: i64,
    pub ratings_sum: f64,
}

impl RatingSummary {
    /// Summarizes a full set of counted ratings.
    pub fn from_ratings<I: IntoIterator<Item = Rating>>(ratings: I) -> Self {
        let (count, sum) = ratings
            .into_iter()
            .fold((0, 0), |(count, sum), rating| (count + 1, sum + rating.stars()));
        Self::from_totals(count, sum as f64)
    }

    /// Adds one rating to the summary.
    pub fn with_rating(self, rating: Rating) -> Self {
        Self::from_totals(self.ratings_count + 1, self.ratings_sum + rating.stars() as f64)
    }

    fn from_totals(ratings_count: i64, ratings_sum: f64) -> Self {
        let average_rating = if ratings_count == 0 {
            0.0
        } else {
            round2(ratings_sum / ratings_count as f64)
        };
        Self {
            average_rating,
            ratings_count,
            ratings_sum,
        }
    }
}

/// Products seeded outside of this service carry no sum, it is rebuilt from average and count.
impl From<&ProductRating> for RatingSummary {
    fn from(value: &ProductRating) -> Self {
        let ratings_count = value.ratings_count.max(0);
        let ratings_sum = value
            .ratings_sum
            .unwrap_or(value.average_rating * ratings_count as f64);
        Self {
            average_rating: value.average_rating,
            ratings_count,
            ratings_sum,
        }
    }
}

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
