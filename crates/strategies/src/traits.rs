//! The strategy contract and shared helpers for calling collaborators.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use domain::{
    CollabResult, CollaboratorError, MovieCatalog, Recommendation, RecommendationRequest,
};

/// Bound on any single collaborator call. A strategy would rather return a
/// thinner result than block a request behind a slow dependency.
pub const COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(5);

/// A pluggable scoring algorithm.
///
/// The two fallible-looking operations (`generate`, `score`) intentionally do
/// not return `Result`: collaborator failure is an expected condition and maps
/// to "no candidates" / score 0.0, logged at warn level inside the strategy.
#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    /// Stable registry name, also stamped on every produced recommendation.
    fn name(&self) -> &'static str;

    /// Upper bound of this strategy's raw score scale. The hybrid blender
    /// divides by this to bring sub-scores onto a common 0-1 scale.
    fn score_ceiling(&self) -> f64;

    /// Whether this strategy can produce meaningful output for the user.
    /// Never errors; if the check itself fails the strategy is not applicable.
    async fn is_applicable(&self, request: &RecommendationRequest) -> bool;

    /// Produce up to `request.limit` recommendations, sorted by score
    /// descending. Empty on failure or when nothing qualifies.
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation>;

    /// Score a single (user, movie) pair on this strategy's raw scale.
    /// 0.0 when the pair cannot be scored.
    async fn score(&self, user_id: &str, movie_id: &str) -> f64;
}

/// Wrap a collaborator call in the standard timeout.
pub async fn bounded<T, F>(call: F) -> CollabResult<T>
where
    F: Future<Output = CollabResult<T>>,
{
    match tokio::time::timeout(COLLABORATOR_TIMEOUT, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout),
    }
}

/// Check a candidate against the request's content filters (genre, year).
/// Skips the catalog round-trip entirely when no filter is set. A candidate
/// whose movie record cannot be fetched fails a requested filter.
pub async fn passes_content_filters<C: MovieCatalog + ?Sized>(
    catalog: &C,
    movie_id: &str,
    request: &RecommendationRequest,
) -> bool {
    let genre_filter = request.genre_filter();
    if genre_filter.is_none() && request.from_year.is_none() && request.to_year.is_none() {
        return true;
    }

    let movie = match bounded(catalog.movie(movie_id)).await {
        Ok(Some(movie)) => movie,
        _ => return false,
    };

    if let Some(wanted) = genre_filter {
        if !movie.matches_any_genre(wanted) {
            return false;
        }
    }
    movie.within_year_bounds(request.from_year, request.to_year)
}

/// Sort by score descending and cut to the request limit.
pub fn rank_and_truncate(recommendations: &mut Vec<Recommendation>, limit: usize) {
    recommendations.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recommendations.truncate(limit);
}
