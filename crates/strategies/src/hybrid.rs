//! Hybrid blender over collaborative, content, and popularity signals.
//!
//! ## Algorithm
//! 1. Fan out to the three sub-strategies concurrently, each with a doubled
//!    candidate budget so the blend has enough overlap to work with
//! 2. Normalize every sub-score by its strategy's ceiling, clamped to 0-1
//! 3. Blend per movie: weighted average over the weights that actually
//!    contributed (a movie seen by two sources is not penalized for the third)
//! 4. Apply a small multiplicative jitter to the sort key only, so repeat
//!    requests don't return a frozen list; the stored score stays exact
//! 5. If nothing blends (brand-new user), fall back to popularity output
//!    retagged as hybrid

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument};

use domain::{MovieId, Recommendation, RecommendationRequest};

use crate::traits::ScoringStrategy;

const COLLABORATIVE_WEIGHT: f64 = 0.5;
const CONTENT_WEIGHT: f64 = 0.3;
const POPULARITY_WEIGHT: f64 = 0.2;

/// Default jitter amplitude: sort keys move by at most +-5%.
const DEFAULT_JITTER: f64 = 0.05;

struct Blend {
    weighted_sum: f64,
    weight_sum: f64,
    signals: Vec<&'static str>,
}

/// Weighted blend of the three personalized/popularity signals.
pub struct HybridStrategy {
    collaborative: Arc<dyn ScoringStrategy>,
    content: Arc<dyn ScoringStrategy>,
    popularity: Arc<dyn ScoringStrategy>,
    weights: (f64, f64, f64),
    jitter_amplitude: f64,
    jitter_seed: Option<u64>,
}

impl HybridStrategy {
    pub fn new(
        collaborative: Arc<dyn ScoringStrategy>,
        content: Arc<dyn ScoringStrategy>,
        popularity: Arc<dyn ScoringStrategy>,
    ) -> Self {
        Self {
            collaborative,
            content,
            popularity,
            weights: (COLLABORATIVE_WEIGHT, CONTENT_WEIGHT, POPULARITY_WEIGHT),
            jitter_amplitude: DEFAULT_JITTER,
            jitter_seed: None,
        }
    }

    /// Configure the blend weights (default: 0.5 / 0.3 / 0.2)
    pub fn with_weights(mut self, collaborative: f64, content: f64, popularity: f64) -> Self {
        self.weights = (collaborative, content, popularity);
        self
    }

    /// Configure the jitter amplitude; 0.0 makes ranking fully deterministic.
    pub fn with_jitter_amplitude(mut self, amplitude: f64) -> Self {
        self.jitter_amplitude = amplitude;
        self
    }

    /// Pin the jitter RNG for reproducible ranking in tests.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
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
        blends: &mut HashMap<MovieId, Blend>,
        recommendations: Vec<Recommendation>,
        ceiling: f64,
        weight: f64,
        signal: &'static str,
    ) {
        for rec in recommendations {
            let normalized = (rec.score / ceiling).clamp(0.0, 1.0);
            let entry = blends.entry(rec.movie_id).or_insert(Blend {
                weighted_sum: 0.0,
                weight_sum: 0.0,
                signals: Vec::new(),
            });
            entry.weighted_sum += normalized * weight;
            entry.weight_sum += weight;
            entry.signals.push(signal);
        }
    }

    /// Sort by jittered key descending, keeping stored scores exact.
    fn rank_with_jitter(&self, recommendations: &mut Vec<Recommendation>, limit: usize) {
        let mut rng = match self.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut keyed: Vec<(f64, Recommendation)> = recommendations
            .drain(..)
            .map(|rec| {
                let key = if self.jitter_amplitude > 0.0 {
                    rec.score * (1.0 + rng.random_range(-self.jitter_amplitude..=self.jitter_amplitude))
                } else {
                    rec.score
                };
                (key, rec)
            })
            .collect();

        keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        keyed.truncate(limit);
        recommendations.extend(keyed.into_iter().map(|(_, rec)| rec));
    }
}

#[async_trait]
impl ScoringStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn score_ceiling(&self) -> f64 {
        1.0
    }

    async fn is_applicable(&self, _request: &RecommendationRequest) -> bool {
        // The popularity fallback guarantees an answer for any user.
        true
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let fan_limit = request.limit * 2;
        let (collab, content, popular) = tokio::join!(
            Self::run_source(&self.collaborative, request, fan_limit),
            Self::run_source(&self.content, request, fan_limit),
            Self::run_source(&self.popularity, request, fan_limit),
        );
        debug!(
            collaborative = collab.len(),
            content = content.len(),
            popular = popular.len(),
            "sub-strategy candidates"
        );

        let mut blends: HashMap<MovieId, Blend> = HashMap::new();
        Self::fold_source(
            &mut blends,
            collab,
            self.collaborative.score_ceiling(),
            self.weights.0,
            "users like you loved it",
        );
        Self::fold_source(
            &mut blends,
            content,
            self.content.score_ceiling(),
            self.weights.1,
            "it matches your taste profile",
        );
        Self::fold_source(
            &mut blends,
            popular,
            self.popularity.score_ceiling(),
            self.weights.2,
            "it's trending with high ratings",
        );

        if blends.is_empty() {
            // Cold start: nothing personalized to blend. Serve popularity
            // under the hybrid label so callers see a consistent algorithm.
            let mut fallback = self.popularity.generate(request).await;
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
                    format!("Recommended because: {}", blend.signals.join(", ")),
                )
            })
            .collect();

        self.rank_with_jitter(&mut recommendations, request.limit);
        debug!(count = recommendations.len(), "generated hybrid recommendations");
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let (collab, content, popular) = tokio::join!(
            self.collaborative.score(user_id, movie_id),
            self.content.score(user_id, movie_id),
            self.popularity.score(user_id, movie_id),
        );

        let sources = [
            (collab, self.collaborative.score_ceiling(), self.weights.0),
            (content, self.content.score_ceiling(), self.weights.1),
            (popular, self.popularity.score_ceiling(), self.weights.2),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborative::CollaborativeStrategy;
    use crate::content::ContentBasedStrategy;
    use crate::popularity::PopularityStrategy;
    use domain::{MemoryDataset, Movie};

    fn movie(id: &str, genres: &[&str], director: Option<&str>) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("Movie {id}"),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            director: director.map(|d| d.to_string()),
            actors: vec![],
            year: Some(2001),
        }
    }

    fn build_dataset() -> Arc<MemoryDataset> {
        let mut data = MemoryDataset::new();
        for i in 1..=8 {
            data.insert_movie(movie(
                &format!("m{i}"),
                if i <= 5 { &["Action"] } else { &["Drama"] },
                Some("Nolan"),
            ));
        }

        // u1 - target.
        data.rate("u1", "m1", 5.0);
        data.rate("u1", "m2", 4.5);
        data.rate("u1", "m3", 4.0);

        // u2 - close neighbor with extra favorites.
        data.rate("u2", "m1", 5.0);
        data.rate("u2", "m2", 4.5);
        data.rate("u2", "m3", 4.0);
        data.rate("u2", "m4", 5.0);
        data.rate("u2", "m5", 4.5);

        // Broad popularity signal.
        for i in 0..30 {
            data.rate(&format!("v{i}"), "m6", 4.2);
            data.rate(&format!("v{i}"), "m7", 3.8);
        }

        Arc::new(data)
    }

    fn hybrid(data: &Arc<MemoryDataset>) -> HybridStrategy {
        HybridStrategy::new(
            Arc::new(CollaborativeStrategy::new(data.clone(), data.clone())),
            Arc::new(ContentBasedStrategy::new(data.clone(), data.clone())),
            Arc::new(PopularityStrategy::new(data.clone(), data.clone())),
        )
    }

    #[tokio::test]
    async fn test_blended_scores_are_normalized() {
        let data = build_dataset();
        let recs = hybrid(&data)
            .generate(&RecommendationRequest::new("u1"))
            .await;

        assert!(!recs.is_empty());
        for rec in &recs {
            assert!(rec.score >= 0.0 && rec.score <= 1.0, "score {}", rec.score);
            assert_eq!(rec.algorithm, "hybrid");
            assert!(rec.reason.starts_with("Recommended because: "));
        }
    }

    #[tokio::test]
    async fn test_zero_jitter_is_deterministic() {
        let data = build_dataset();
        let strategy = hybrid(&data).with_jitter_amplitude(0.0);
        let request = RecommendationRequest::new("u1");

        let first = strategy.generate(&request).await;
        let second = strategy.generate(&request).await;

        let first_ids: Vec<&str> = first.iter().map(|r| r.movie_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|r| r.movie_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_seeded_jitter_is_reproducible() {
        let data = build_dataset();
        let request = RecommendationRequest::new("u1");

        let first = hybrid(&data).with_jitter_seed(42).generate(&request).await;
        let second = hybrid(&data).with_jitter_seed(42).generate(&request).await;

        let first_ids: Vec<&str> = first.iter().map(|r| r.movie_id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|r| r.movie_id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[tokio::test]
    async fn test_new_user_falls_back_to_popularity_as_hybrid() {
        let data = build_dataset();
        let recs = hybrid(&data)
            .with_jitter_amplitude(0.0)
            .generate(&RecommendationRequest::new("total-stranger"))
            .await;

        assert!(!recs.is_empty());
        for rec in &recs {
            assert_eq!(rec.algorithm, "hybrid");
            // Only the popularity signal can fire for a user with no history.
            assert_eq!(rec.reason, "Recommended because: it's trending with high ratings");
        }
        // Ranking follows popularity: the broadly loved m6 leads.
        assert_eq!(recs[0].movie_id, "m6");
    }

    #[tokio::test]
    async fn test_multi_source_movies_carry_combined_reason() {
        let data = build_dataset();
        let strategy = hybrid(&data).with_jitter_amplitude(0.0);
        let recs = strategy
            .generate(&RecommendationRequest::new("u1").with_limit(20))
            .await;

        // m4 is a neighbor favorite and matches u1's Action/Nolan profile.
        let m4 = recs.iter().find(|r| r.movie_id == "m4").unwrap();
        assert!(m4.reason.contains("users like you loved it"));
        assert!(m4.reason.contains("it matches your taste profile"));
    }

    #[tokio::test]
    async fn test_respects_limit() {
        let data = build_dataset();
        let recs = hybrid(&data)
            .generate(&RecommendationRequest::new("u1").with_limit(3))
            .await;
        assert!(recs.len() <= 3);
    }
}
