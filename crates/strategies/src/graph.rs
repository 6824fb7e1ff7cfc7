//! Strategies backed by the graph-query oracle.
//!
//! These treat [`GraphQueries`] as precomputed algorithms over the
//! user-rating-movie graph and only do lightweight aggregation on top:
//!
//! - [`GraphCollaborativeStrategy`]: similar-user neighborhoods from the
//!   oracle instead of in-process cosine scans
//! - [`GraphCentralityStrategy`]: globally influential movies, presented on
//!   their own raw scale
//! - [`GraphContentStrategy`]: movies feature-similar to what the user loved
//! - [`GraphHybridStrategy`]: weighted blend of the other three graph signals

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use domain::{
    GraphQueries, MovieCatalog, MovieId, RatingStore, Recommendation, RecommendationRequest,
};

use crate::profile::{build_profile, UserProfile};
use crate::traits::{bounded, passes_content_filters, rank_and_truncate, ScoringStrategy};

const SIMILARITY_CUTOFF: f64 = 0.3;
const NEIGHBOR_LIMIT: usize = 50;
const HIGH_RATING_THRESHOLD: f64 = 4.0;
const SIMILAR_MOVIES_PER_SEED: usize = 20;

// ---------------------------------------------------------------------------
// Graph collaborative
// ---------------------------------------------------------------------------

/// Collaborative filtering where the neighborhood comes from the graph
/// oracle's user-similarity query.
pub struct GraphCollaborativeStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    graph: Arc<dyn GraphQueries>,
}

impl GraphCollaborativeStrategy {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        graph: Arc<dyn GraphQueries>,
    ) -> Self {
        Self {
            ratings,
            catalog,
            graph,
        }
    }
}

#[async_trait]
impl ScoringStrategy for GraphCollaborativeStrategy {
    fn name(&self) -> &'static str {
        "graph-collaborative"
    }

    fn score_ceiling(&self) -> f64 {
        10.0
    }

    async fn is_applicable(&self, request: &RecommendationRequest) -> bool {
        match bounded(self.ratings.rating_count(&request.user_id)).await {
            Ok(count) => count >= 3,
            Err(_) => false,
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

        let neighbors = match bounded(self.graph.similar_users(
            &request.user_id,
            SIMILARITY_CUTOFF,
            NEIGHBOR_LIMIT,
        ))
        .await
        {
            Ok(neighbors) => neighbors,
            Err(err) => {
                warn!(error = %err, "similar-users query failed");
                return Vec::new();
            }
        };
        debug!(neighbors = neighbors.len(), "oracle returned neighbors");

        // movie -> (rating sum, similarity sum, support)
        let mut candidates: HashMap<MovieId, (f64, f64, u32)> = HashMap::new();
        for neighbor in &neighbors {
            let history = match bounded(self.ratings.ratings_for_user(&neighbor.id)).await {
                Ok(history) => history,
                Err(err) => {
                    warn!(neighbor_id = %neighbor.id, error = %err, "skipping neighbor");
                    continue;
                }
            };
            for rating in history {
                if rating.value >= HIGH_RATING_THRESHOLD
                    && (request.include_watched || !profile.has_watched(&rating.movie_id))
                {
                    let entry = candidates.entry(rating.movie_id).or_insert((0.0, 0.0, 0));
                    entry.0 += rating.value;
                    entry.1 += neighbor.score;
                    entry.2 += 1;
                }
            }
        }

        let mut recommendations = Vec::with_capacity(candidates.len());
        for (movie_id, (rating_sum, similarity_sum, support)) in candidates {
            if !passes_content_filters(self.catalog.as_ref(), &movie_id, request).await {
                continue;
            }
            let avg = rating_sum / support as f64;
            let mean_similarity = similarity_sum / support as f64;
            let score = avg * mean_similarity * ((support as f64) + 1.0).ln();
            recommendations.push(Recommendation::new(
                request.user_id.clone(),
                movie_id,
                score,
                self.name(),
                format!("Loved by {support} of your nearest neighbors in the taste graph"),
            ));
        }

        rank_and_truncate(&mut recommendations, request.limit);
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let neighbors = match bounded(self.graph.similar_users(
            user_id,
            SIMILARITY_CUTOFF,
            NEIGHBOR_LIMIT,
        ))
        .await
        {
            Ok(neighbors) => neighbors,
            Err(_) => return 0.0,
        };

        let mut rating_sum = 0.0;
        let mut similarity_sum = 0.0;
        let mut support = 0u32;
        for neighbor in &neighbors {
            let Ok(history) = bounded(self.ratings.ratings_for_user(&neighbor.id)).await else {
                continue;
            };
            if let Some(rating) = history.iter().find(|r| r.movie_id == movie_id) {
                rating_sum += rating.value;
                similarity_sum += neighbor.score;
                support += 1;
            }
        }
        if support == 0 {
            return 0.0;
        }
        (rating_sum / support as f64) * (similarity_sum / support as f64)
            * ((support as f64) + 1.0).ln()
    }
}

// ---------------------------------------------------------------------------
// Graph centrality
// ---------------------------------------------------------------------------

/// Globally influential movies by graph centrality. Scores live on their own
/// scale (centrality x 100 plus a volume term) and are presented raw; only
/// the graph-side blend normalizes them, via the ceiling.
pub struct GraphCentralityStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    graph: Arc<dyn GraphQueries>,
}

impl GraphCentralityStrategy {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        graph: Arc<dyn GraphQueries>,
    ) -> Self {
        Self {
            ratings,
            catalog,
            graph,
        }
    }

    fn centrality_score(centrality: f64, rating_count: u32) -> f64 {
        centrality * 100.0 + ((rating_count as f64) + 1.0).ln()
    }
}

#[async_trait]
impl ScoringStrategy for GraphCentralityStrategy {
    fn name(&self) -> &'static str {
        "graph-centrality"
    }

    fn score_ceiling(&self) -> f64 {
        // The centrality share saturates at 100; the volume term past that is
        // clamped away when the graph blend normalizes.
        100.0
    }

    async fn is_applicable(&self, _request: &RecommendationRequest) -> bool {
        true
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let profile = match build_profile(self.ratings.as_ref(), &request.user_id, 0.0).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "could not load rating history, not excluding anything");
                UserProfile {
                    user_id: request.user_id.clone(),
                    watched: Default::default(),
                    liked: Vec::new(),
                    rating_vector: Default::default(),
                    avg_rating: 0.0,
                }
            }
        };

        // Over-fetch so exclusions and filters don't starve the page.
        let fetch = (request.limit + profile.watched.len()).max(request.limit * 3);
        let central = match bounded(self.graph.movie_centrality(fetch)).await {
            Ok(central) => central,
            Err(err) => {
                warn!(error = %err, "centrality query failed");
                return Vec::new();
            }
        };

        let mut recommendations = Vec::new();
        for node in central {
            if !request.include_watched && profile.has_watched(&node.id) {
                continue;
            }
            if !passes_content_filters(self.catalog.as_ref(), &node.id, request).await {
                continue;
            }
            let rating_count = match bounded(self.catalog.stats(&node.id)).await {
                Ok(Some(stats)) => {
                    if stats.avg_rating < request.min_average_movie_rating {
                        continue;
                    }
                    stats.rating_count
                }
                _ => 0,
            };
            recommendations.push(Recommendation::new(
                request.user_id.clone(),
                node.id.clone(),
                Self::centrality_score(node.score, rating_count),
                self.name(),
                "A cornerstone title in the viewing network".to_string(),
            ));
        }

        rank_and_truncate(&mut recommendations, request.limit);
        recommendations
    }

    async fn score(&self, _user_id: &str, movie_id: &str) -> f64 {
        // The oracle only exposes ranked lists, so fetch a generous slice.
        let central = match bounded(self.graph.movie_centrality(1000)).await {
            Ok(central) => central,
            Err(_) => return 0.0,
        };
        let Some(node) = central.iter().find(|n| n.id == movie_id) else {
            return 0.0;
        };
        let rating_count = match bounded(self.catalog.stats(movie_id)).await {
            Ok(Some(stats)) => stats.rating_count,
            _ => 0,
        };
        Self::centrality_score(node.score, rating_count)
    }
}

// ---------------------------------------------------------------------------
// Graph content
// ---------------------------------------------------------------------------

/// Feature-similarity expansion: for each movie the user loved, pull the
/// oracle's most similar movies and aggregate.
pub struct GraphContentStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
    graph: Arc<dyn GraphQueries>,
}

impl GraphContentStrategy {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        graph: Arc<dyn GraphQueries>,
    ) -> Self {
        Self {
            ratings,
            catalog,
            graph,
        }
    }
}

#[async_trait]
impl ScoringStrategy for GraphContentStrategy {
    fn name(&self) -> &'static str {
        "graph-content"
    }

    fn score_ceiling(&self) -> f64 {
        10.0
    }

    async fn is_applicable(&self, request: &RecommendationRequest) -> bool {
        match bounded(self.ratings.rating_count(&request.user_id)).await {
            Ok(count) => count >= 2,
            Err(_) => false,
        }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let profile = match build_profile(
            self.ratings.as_ref(),
            &request.user_id,
            HIGH_RATING_THRESHOLD,
        )
        .await
        {
            Ok(profile) => profile,
            Err(err) => {
                warn!(error = %err, "could not load rating history");
                return Vec::new();
            }
        };
        if profile.liked.is_empty() {
            return Vec::new();
        }

        // movie -> (best similarity, number of liked seeds reaching it)
        let mut candidates: HashMap<MovieId, (f64, u32)> = HashMap::new();
        for seed in &profile.liked {
            let similar = match bounded(
                self.graph
                    .similar_movies(&seed.movie_id, SIMILAR_MOVIES_PER_SEED),
            )
            .await
            {
                Ok(similar) => similar,
                Err(err) => {
                    warn!(seed = %seed.movie_id, error = %err, "similar-movies query failed");
                    continue;
                }
            };
            for node in similar {
                if !request.include_watched && profile.has_watched(&node.id) {
                    continue;
                }
                let entry = candidates.entry(node.id).or_insert((0.0, 0));
                entry.0 = entry.0.max(node.score);
                entry.1 += 1;
            }
        }
        debug!(candidates = candidates.len(), "aggregated similar movies");

        let mut recommendations = Vec::with_capacity(candidates.len());
        for (movie_id, (best_similarity, seeds)) in candidates {
            if !passes_content_filters(self.catalog.as_ref(), &movie_id, request).await {
                continue;
            }
            let avg_rating = match bounded(self.catalog.stats(&movie_id)).await {
                Ok(Some(stats)) => {
                    if stats.avg_rating < request.min_average_movie_rating {
                        continue;
                    }
                    stats.avg_rating
                }
                Ok(None) => continue,
                Err(_) => continue,
            };
            let score = best_similarity * avg_rating * ((seeds as f64) + 1.0).ln();
            recommendations.push(Recommendation::new(
                request.user_id.clone(),
                movie_id,
                score,
                self.name(),
                format!("Closely related to {seeds} of your favorites"),
            ));
        }

        rank_and_truncate(&mut recommendations, request.limit);
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let profile = match build_profile(self.ratings.as_ref(), user_id, HIGH_RATING_THRESHOLD)
            .await
        {
            Ok(profile) => profile,
            Err(_) => return 0.0,
        };

        let mut best_similarity: f64 = 0.0;
        let mut seeds = 0u32;
        for seed in &profile.liked {
            let Ok(similar) = bounded(
                self.graph
                    .similar_movies(&seed.movie_id, SIMILAR_MOVIES_PER_SEED),
            )
            .await
            else {
                continue;
            };
            if let Some(node) = similar.iter().find(|n| n.id == movie_id) {
                best_similarity = best_similarity.max(node.score);
                seeds += 1;
            }
        }
        if seeds == 0 {
            return 0.0;
        }
        let avg_rating = match bounded(self.catalog.stats(movie_id)).await {
            Ok(Some(stats)) => stats.avg_rating,
            _ => return 0.0,
        };
        best_similarity * avg_rating * ((seeds as f64) + 1.0).ln()
    }
}

// ---------------------------------------------------------------------------
// Graph hybrid
// ---------------------------------------------------------------------------

const GRAPH_COLLABORATIVE_WEIGHT: f64 = 0.4;
const GRAPH_CONTENT_WEIGHT: f64 = 0.3;
const GRAPH_CENTRALITY_WEIGHT: f64 = 0.3;

struct GraphBlend {
    weighted_sum: f64,
    weight_sum: f64,
    signals: Vec<&'static str>,
}

/// Weighted blend of the three graph signals: similar-user neighborhoods
/// (0.4), feature similarity (0.3), and centrality (0.3). Sub-scores are
/// normalized by each strategy's ceiling before mixing, and a movie is
/// averaged only over the weights that actually reached it. Centrality keeps
/// the blend alive for cold-start users, so this is always applicable.
pub struct GraphHybridStrategy {
    collaborative: Arc<dyn ScoringStrategy>,
    content: Arc<dyn ScoringStrategy>,
    centrality: Arc<dyn ScoringStrategy>,
    weights: (f64, f64, f64),
}

impl GraphHybridStrategy {
    pub fn new(
        collaborative: Arc<dyn ScoringStrategy>,
        content: Arc<dyn ScoringStrategy>,
        centrality: Arc<dyn ScoringStrategy>,
    ) -> Self {
        Self {
            collaborative,
            content,
            centrality,
            weights: (
                GRAPH_COLLABORATIVE_WEIGHT,
                GRAPH_CONTENT_WEIGHT,
                GRAPH_CENTRALITY_WEIGHT,
            ),
        }
    }

    /// Configure the blend weights (default: 0.4 / 0.3 / 0.3)
    pub fn with_weights(mut self, collaborative: f64, content: f64, centrality: f64) -> Self {
        self.weights = (collaborative, content, centrality);
        self
    }

    /// Run one sub-strategy if it is applicable, empty otherwise.
    async fn run_source(
        strategy: &Arc<dyn ScoringStrategy>,
        request: &RecommendationRequest,
        fan_limit: usize,
    ) -> Vec<Recommendation> {
        let sub_request = request.for_algorithm(strategy.name(), fan_limit);
        if !strategy.is_applicable(&sub_request).await {
            return Vec::new();
        }
        strategy.generate(&sub_request).await
    }

    fn fold_source(
        blends: &mut HashMap<MovieId, GraphBlend>,
        recommendations: Vec<Recommendation>,
        ceiling: f64,
        weight: f64,
        signal: &'static str,
    ) {
        for rec in recommendations {
            let normalized = (rec.score / ceiling).clamp(0.0, 1.0);
            let entry = blends.entry(rec.movie_id).or_insert(GraphBlend {
                weighted_sum: 0.0,
                weight_sum: 0.0,
                signals: Vec::new(),
            });
            entry.weighted_sum += normalized * weight;
            entry.weight_sum += weight;
            entry.signals.push(signal);
        }
    }
}

#[async_trait]
impl ScoringStrategy for GraphHybridStrategy {
    fn name(&self) -> &'static str {
        "graph-hybrid"
    }

    fn score_ceiling(&self) -> f64 {
        1.0
    }

    async fn is_applicable(&self, _request: &RecommendationRequest) -> bool {
        // Centrality covers users with no history at all.
        true
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let fan_limit = request.limit * 2;
        let (collab, content, central) = tokio::join!(
            Self::run_source(&self.collaborative, request, fan_limit),
            Self::run_source(&self.content, request, fan_limit),
            Self::run_source(&self.centrality, request, fan_limit),
        );
        debug!(
            collaborative = collab.len(),
            content = content.len(),
            centrality = central.len(),
            "graph sub-strategy candidates"
        );

        let mut blends: HashMap<MovieId, GraphBlend> = HashMap::new();
        Self::fold_source(
            &mut blends,
            collab,
            self.collaborative.score_ceiling(),
            self.weights.0,
            "viewers near you in the taste graph loved it",
        );
        Self::fold_source(
            &mut blends,
            content,
            self.content.score_ceiling(),
            self.weights.1,
            "it sits close to your favorites",
        );
        Self::fold_source(
            &mut blends,
            central,
            self.centrality.score_ceiling(),
            self.weights.2,
            "it anchors the viewing network",
        );

        if blends.is_empty() {
            // Every graph signal came up dry; serve centrality raw under this
            // strategy's label so callers see a consistent algorithm.
            let mut fallback = self.centrality.generate(request).await;
            for rec in &mut fallback {
                rec.algorithm = self.name().to_string();
            }
            return fallback;
        }

        let mut recommendations: Vec<Recommendation> = blends
            .into_iter()
            .map(|(movie_id, blend)| {
                Recommendation::new(
                    request.user_id.clone(),
                    movie_id,
                    blend.weighted_sum / blend.weight_sum,
                    self.name(),
                    format!("Recommended from the graph: {}", blend.signals.join(", ")),
                )
            })
            .collect();

        rank_and_truncate(&mut recommendations, request.limit);
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let (collab, content, central) = tokio::join!(
            self.collaborative.score(user_id, movie_id),
            self.content.score(user_id, movie_id),
            self.centrality.score(user_id, movie_id),
        );

        let sources = [
            (collab, self.collaborative.score_ceiling(), self.weights.0),
            (content, self.content.score_ceiling(), self.weights.1),
            (central, self.centrality.score_ceiling(), self.weights.2),
        ];

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (score, ceiling, weight) in sources {
            if score > 0.0 {
                weighted_sum += (score / ceiling).clamp(0.0, 1.0) * weight;
                weight_sum += weight;
            }
        }
        if weight_sum == 0.0 {
            return 0.0;
        }
        weighted_sum / weight_sum
    }
}
