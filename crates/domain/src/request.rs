//! The request contract for generating recommendations.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::UserId;

/// Default number of recommendations per request.
pub const DEFAULT_LIMIT: usize = 10;

/// Upper bound on `limit`; larger values are a client error.
pub const MAX_LIMIT: usize = 100;

/// Input contract for one recommendation run. Requests are stateless and
/// constructed per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: UserId,
    /// Number of results to return, 1-100.
    pub limit: usize,
    /// Strategy name to dispatch to ("hybrid" by default).
    pub algorithm: String,
    /// Threshold deciding which of the user's own past ratings count as
    /// "liked" when mining preferences.
    pub min_rating: f64,
    /// Quality floor on a candidate movie's average rating.
    pub min_average_movie_rating: f64,
    /// When false, movies the user has already rated are excluded.
    pub include_watched: bool,
    /// Optional genre filter, OR semantics. `None` means unfiltered.
    pub genre: Option<Vec<String>>,
    pub from_year: Option<u16>,
    pub to_year: Option<u16>,
}

impl RecommendationRequest {
    /// Create a request with the documented defaults.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            limit: DEFAULT_LIMIT,
            algorithm: "hybrid".to_string(),
            min_rating: 3.0,
            min_average_movie_rating: 0.0,
            include_watched: false,
            genre: None,
            from_year: None,
            to_year: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_min_rating(mut self, min_rating: f64) -> Self {
        self.min_rating = min_rating;
        self
    }

    pub fn with_min_average_movie_rating(mut self, floor: f64) -> Self {
        self.min_average_movie_rating = floor;
        self
    }

    pub fn with_include_watched(mut self, include: bool) -> Self {
        self.include_watched = include;
        self
    }

    pub fn with_genre(mut self, genres: Vec<String>) -> Self {
        self.genre = Some(genres);
        self
    }

    pub fn with_year_range(mut self, from: Option<u16>, to: Option<u16>) -> Self {
        self.from_year = from;
        self.to_year = to;
        self
    }

    /// The genre filter, if present and non-empty.
    pub fn genre_filter(&self) -> Option<&[String]> {
        self.genre.as_deref().filter(|g| !g.is_empty())
    }

    /// Validate the client-controlled fields.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.user_id.trim().is_empty() {
            return Err(EngineError::InvalidRequest(
                "user id must not be blank".to_string(),
            ));
        }
        if self.limit < 1 || self.limit > MAX_LIMIT {
            return Err(EngineError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Derive a sub-request targeting a different strategy, used by the
    /// hybrid blender to fan out with a larger candidate budget.
    pub fn for_algorithm(&self, algorithm: &str, limit: usize) -> Self {
        let mut request = self.clone();
        request.algorithm = algorithm.to_string();
        request.limit = limit;
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = RecommendationRequest::new("u1");
        assert_eq!(request.limit, 10);
        assert_eq!(request.algorithm, "hybrid");
        assert!((request.min_rating - 3.0).abs() < f64::EPSILON);
        assert!(!request.include_watched);
        assert!(request.genre_filter().is_none());
    }

    #[test]
    fn test_blank_user_rejected() {
        let request = RecommendationRequest::new("   ");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_limit_bounds() {
        assert!(RecommendationRequest::new("u1").with_limit(0).validate().is_err());
        assert!(RecommendationRequest::new("u1").with_limit(101).validate().is_err());
        assert!(RecommendationRequest::new("u1").with_limit(1).validate().is_ok());
        assert!(RecommendationRequest::new("u1").with_limit(100).validate().is_ok());
    }

    #[test]
    fn test_empty_genre_list_means_unfiltered() {
        let request = RecommendationRequest::new("u1").with_genre(vec![]);
        assert!(request.genre_filter().is_none());
    }

    #[test]
    fn test_for_algorithm_preserves_filters() {
        let request = RecommendationRequest::new("u1")
            .with_genre(vec!["Action".to_string()])
            .with_min_rating(4.0);
        let sub = request.for_algorithm("popular", 20);
        assert_eq!(sub.algorithm, "popular");
        assert_eq!(sub.limit, 20);
        assert_eq!(sub.genre, request.genre);
        assert!((sub.min_rating - 4.0).abs() < f64::EPSILON);
    }
}
