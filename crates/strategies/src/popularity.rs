//! Popularity scoring with a Bayesian prior.
//!
//! Uses the weighted-rating formula so a movie with three perfect ratings
//! cannot outrank a broadly loved classic:
//!
//! ```text
//! WR = (v / (v + m)) * R + (m / (v + m)) * C
//! ```
//!
//! where `R` is the movie's average, `v` its rating count, `C` the catalog's
//! global mean, and `m` the prior vote weight. A log-scaled volume bonus is
//! added on top so ties break toward widely seen titles.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use domain::{MovieCatalog, MovieId, RatingStore, Recommendation, RecommendationRequest};

use crate::traits::{bounded, rank_and_truncate, ScoringStrategy};

/// Prior vote weight `m`: how many phantom global-mean votes each movie
/// starts with.
const PRIOR_VOTES: f64 = 25.0;

/// Volume bonus saturates around this many ratings.
const VOLUME_SATURATION: f64 = 1000.0;

/// Catalog-wide popularity, the strategy of last resort: applicable to every
/// user including ones with no history at all.
pub struct PopularityStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
}

impl PopularityStrategy {
    pub fn new(ratings: Arc<dyn RatingStore>, catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { ratings, catalog }
    }

    fn weighted_rating(avg: f64, votes: f64, global_mean: f64) -> f64 {
        let wr = (votes / (votes + PRIOR_VOTES)) * avg
            + (PRIOR_VOTES / (votes + PRIOR_VOTES)) * global_mean;
        wr + (votes + 1.0).ln() / VOLUME_SATURATION.ln()
    }

    async fn watched_set(&self, user_id: &str) -> HashSet<MovieId> {
        match bounded(self.ratings.ratings_for_user(user_id)).await {
            Ok(history) => history.into_iter().map(|r| r.movie_id).collect(),
            Err(err) => {
                // A cold rating store just means nothing gets excluded.
                warn!(user_id, error = %err, "could not load watch history");
                HashSet::new()
            }
        }
    }
}

#[async_trait]
impl ScoringStrategy for PopularityStrategy {
    fn name(&self) -> &'static str {
        "popular"
    }

    fn score_ceiling(&self) -> f64 {
        6.0
    }

    async fn is_applicable(&self, _request: &RecommendationRequest) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let movies = match bounded(self.catalog.all_movies()).await {
            Ok(movies) => movies,
            Err(err) => {
                warn!(error = %err, "could not load catalog");
                return Vec::new();
            }
        };
        let global_mean = match bounded(self.catalog.global_mean_rating()).await {
            Ok(mean) => mean,
            Err(err) => {
                warn!(error = %err, "could not load global mean rating");
                return Vec::new();
            }
        };

        let watched = if request.include_watched {
            HashSet::new()
        } else {
            self.watched_set(&request.user_id).await
        };

        let mut recommendations = Vec::new();
        for movie in movies {
            if watched.contains(&movie.id) {
                continue;
            }
            if let Some(wanted) = request.genre_filter() {
                if !movie.matches_any_genre(wanted) {
                    continue;
                }
            }
            if !movie.within_year_bounds(request.from_year, request.to_year) {
                continue;
            }

            let stats = match bounded(self.catalog.stats(&movie.id)).await {
                Ok(Some(stats)) => stats,
                Ok(None) => continue,
                Err(err) => {
                    warn!(movie_id = %movie.id, error = %err, "skipping movie without stats");
                    continue;
                }
            };
            if stats.avg_rating < request.min_average_movie_rating {
                continue;
            }

            let score =
                Self::weighted_rating(stats.avg_rating, stats.rating_count as f64, global_mean);
            recommendations.push(Recommendation::new(
                request.user_id.clone(),
                movie.id,
                score,
                self.name(),
                format!(
                    "Popular: rated {:.1}/5 by {} viewers",
                    stats.avg_rating, stats.rating_count
                ),
            ));
        }

        rank_and_truncate(&mut recommendations, request.limit);
        debug!(count = recommendations.len(), "generated popularity recommendations");
        recommendations
    }

    async fn score(&self, _user_id: &str, movie_id: &str) -> f64 {
        let stats = match bounded(self.catalog.stats(movie_id)).await {
            Ok(Some(stats)) => stats,
            _ => return 0.0,
        };
        let global_mean = match bounded(self.catalog.global_mean_rating()).await {
            Ok(mean) => mean,
            Err(_) => return 0.0,
        };
        Self::weighted_rating(stats.avg_rating, stats.rating_count as f64, global_mean)
    }
}
