//! User-based collaborative filtering.
//!
//! "People whose ratings look like yours also loved these."
//!
//! ## Algorithm
//! 1. Build the target user's rating vector
//! 2. Collect everyone who rated the same movies, with their ratings on the
//!    shared movies
//! 3. Keep neighbors with enough shared movies and cosine similarity above
//!    the cutoff, strongest first
//! 4. Aggregate the neighbors' highly-rated, unwatched movies
//! 5. Score each candidate by average neighbor rating, weighted by mean
//!    similarity and a log support bonus

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use domain::{
    MovieCatalog, MovieId, RatingStore, Recommendation, RecommendationRequest, UserId,
};

use crate::profile::{build_profile, UserProfile};
use crate::traits::{bounded, passes_content_filters, rank_and_truncate, ScoringStrategy};

/// Collaborative filtering over shared rating history.
pub struct CollaborativeStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,

    /// Minimum shared movies before a similarity is trusted.
    min_shared_movies: usize,

    /// Cosine similarity cutoff for neighbors.
    similarity_cutoff: f64,

    /// Rating at or above which a neighbor's rating nominates a candidate.
    high_rating_threshold: f64,

    /// Cap on neighbors considered, strongest-similarity first.
    neighbor_limit: usize,
}

impl CollaborativeStrategy {
    pub fn new(ratings: Arc<dyn RatingStore>, catalog: Arc<dyn MovieCatalog>) -> Self {
        Self {
            ratings,
            catalog,
            min_shared_movies: 3,
            similarity_cutoff: 0.3,
            high_rating_threshold: 4.0,
            neighbor_limit: 50,
        }
    }

    /// Configure the minimum shared movies per neighbor (default: 3)
    pub fn with_min_shared_movies(mut self, min: usize) -> Self {
        self.min_shared_movies = min;
        self
    }

    /// Configure the cosine similarity cutoff (default: 0.3)
    pub fn with_similarity_cutoff(mut self, cutoff: f64) -> Self {
        self.similarity_cutoff = cutoff;
        self
    }

    /// Configure the high rating threshold (default: 4.0)
    pub fn with_high_rating_threshold(mut self, threshold: f64) -> Self {
        self.high_rating_threshold = threshold;
        self
    }

    /// Find neighbors of the profiled user: (neighbor id, cosine similarity),
    /// strongest first, capped at `neighbor_limit`.
    async fn find_neighbors(&self, profile: &UserProfile) -> Vec<(UserId, f64)> {
        // Everyone who co-rated at least one of the user's movies, keyed to
        // their ratings on the shared movies only.
        let mut co_raters: HashMap<UserId, HashMap<MovieId, f64>> = HashMap::new();
        for movie_id in profile.rating_vector.keys() {
            let movie_ratings = match bounded(self.ratings.ratings_for_movie(movie_id)).await {
                Ok(ratings) => ratings,
                Err(err) => {
                    warn!(movie_id, error = %err, "skipping movie while building neighbor set");
                    continue;
                }
            };
            for rating in movie_ratings {
                if rating.user_id != profile.user_id {
                    co_raters
                        .entry(rating.user_id)
                        .or_default()
                        .insert(rating.movie_id, rating.value);
                }
            }
        }

        let mut neighbors: Vec<(UserId, f64)> = co_raters
            .par_iter()
            .filter(|(_, shared)| shared.len() >= self.min_shared_movies)
            .filter_map(|(user_id, shared)| {
                let similarity = cosine_over_shared(&profile.rating_vector, shared);
                (similarity >= self.similarity_cutoff).then(|| (user_id.clone(), similarity))
            })
            .collect();

        neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(self.neighbor_limit);
        neighbors
    }

    /// Aggregate the neighbors' highly-rated unwatched movies into
    /// movie -> (rating sum, similarity sum, supporting neighbors).
    async fn collect_candidates(
        &self,
        neighbors: &[(UserId, f64)],
        profile: &UserProfile,
        include_watched: bool,
    ) -> HashMap<MovieId, (f64, f64, u32)> {
        let mut candidates: HashMap<MovieId, (f64, f64, u32)> = HashMap::new();
        for (neighbor_id, similarity) in neighbors {
            let neighbor_ratings = match bounded(self.ratings.ratings_for_user(neighbor_id)).await
            {
                Ok(ratings) => ratings,
                Err(err) => {
                    warn!(neighbor_id, error = %err, "skipping neighbor");
                    continue;
                }
            };
            for rating in neighbor_ratings {
                if rating.value >= self.high_rating_threshold
                    && (include_watched || !profile.has_watched(&rating.movie_id))
                {
                    let entry = candidates.entry(rating.movie_id).or_insert((0.0, 0.0, 0));
                    entry.0 += rating.value;
                    entry.1 += similarity;
                    entry.2 += 1;
                }
            }
        }
        candidates
    }

    /// Average neighbor rating, damped by mean similarity and boosted by
    /// log support. Peaks just above the rating scale for broad consensus.
    fn candidate_score(rating_sum: f64, similarity_sum: f64, support: u32) -> f64 {
        let avg_rating = rating_sum / support as f64;
        let mean_similarity = similarity_sum / support as f64;
        avg_rating * mean_similarity * ((support as f64) + 1.0).ln()
    }

    async fn passes_quality_floor(&self, movie_id: &str, floor: f64) -> bool {
        if floor <= 0.0 {
            return true;
        }
        match bounded(self.catalog.stats(movie_id)).await {
            Ok(Some(stats)) => stats.avg_rating >= floor,
            _ => false,
        }
    }
}

fn cosine_over_shared(target: &HashMap<MovieId, f64>, shared: &HashMap<MovieId, f64>) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (movie_id, their_value) in shared {
        let Some(our_value) = target.get(movie_id) else {
            continue;
        };
        dot += our_value * their_value;
        norm_a += our_value * our_value;
        norm_b += their_value * their_value;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl ScoringStrategy for CollaborativeStrategy {
    fn name(&self) -> &'static str {
        "collaborative"
    }

    fn score_ceiling(&self) -> f64 {
        10.0
    }

    async fn is_applicable(&self, request: &RecommendationRequest) -> bool {
        match bounded(self.ratings.rating_count(&request.user_id)).await {
            Ok(count) => count >= self.min_shared_movies,
            Err(err) => {
                warn!(user_id = %request.user_id, error = %err, "applicability check failed");
                false
            }
        }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let profile = match build_profile(self.ratings.as_ref(), &request.user_id, 0.0).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "could not load rating history");
                return Vec::new();
            }
        };
        if profile.rating_vector.is_empty() {
            return Vec::new();
        }

        let neighbors = self.find_neighbors(&profile).await;
        debug!(neighbors = neighbors.len(), "found similar users");
        if neighbors.is_empty() {
            return Vec::new();
        }

        let candidates = self
            .collect_candidates(&neighbors, &profile, request.include_watched)
            .await;

        let mut recommendations = Vec::with_capacity(candidates.len());
        for (movie_id, (rating_sum, similarity_sum, support)) in candidates {
            if !passes_content_filters(self.catalog.as_ref(), &movie_id, request).await {
                continue;
            }
            if !self
                .passes_quality_floor(&movie_id, request.min_average_movie_rating)
                .await
            {
                continue;
            }

            let score = Self::candidate_score(rating_sum, similarity_sum, support);
            recommendations.push(Recommendation::new(
                request.user_id.clone(),
                movie_id,
                score,
                self.name(),
                format!("Loved by {support} viewers with similar taste"),
            ));
        }

        rank_and_truncate(&mut recommendations, request.limit);
        debug!(count = recommendations.len(), "generated collaborative recommendations");
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let profile = match build_profile(self.ratings.as_ref(), user_id, 0.0).await {
            Ok(profile) => profile,
            Err(_) => return 0.0,
        };
        if profile.rating_vector.is_empty() {
            return 0.0;
        }

        let raters = match bounded(self.ratings.ratings_for_movie(movie_id)).await {
            Ok(raters) => raters,
            Err(_) => return 0.0,
        };

        let mut rating_sum = 0.0;
        let mut similarity_sum = 0.0;
        let mut support = 0u32;
        for rating in raters {
            if rating.user_id == profile.user_id {
                continue;
            }
            let Ok(their_history) = bounded(self.ratings.ratings_for_user(&rating.user_id)).await
            else {
                continue;
            };
            let shared: HashMap<MovieId, f64> = their_history
                .into_iter()
                .filter(|r| profile.rating_vector.contains_key(&r.movie_id))
                .map(|r| (r.movie_id, r.value))
                .collect();
            if shared.len() < self.min_shared_movies {
                continue;
            }
            let similarity = cosine_over_shared(&profile.rating_vector, &shared);
            if similarity < self.similarity_cutoff {
                continue;
            }
            rating_sum += rating.value;
            similarity_sum += similarity;
            support += 1;
        }

        if support == 0 {
            return 0.0;
        }
        Self::candidate_score(rating_sum, similarity_sum, support)
    }
}
