//! Content-based filtering over the user's genre and director preferences.
//!
//! ## Algorithm
//! 1. Mine the user's liked ratings (>= request.min_rating) for preferences
//! 2. Keep the top 5 genres and top 3 directors by average liked rating
//! 3. Pool candidates from the catalog's genre and director indices
//! 4. Score each candidate: preference average x (movie average / 5)
//! 5. A movie reachable through both pools keeps its higher score

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use domain::{
    Movie, MovieCatalog, MovieId, RatingStore, Recommendation, RecommendationRequest,
};

use crate::profile::{
    build_profile, director_preferences, genre_preferences, top_preferences, UserProfile,
};
use crate::traits::{bounded, rank_and_truncate, ScoringStrategy};

const TOP_GENRES: usize = 5;
const TOP_DIRECTORS: usize = 3;

/// Content-based filtering: match candidates to the user's taste profile.
pub struct ContentBasedStrategy {
    ratings: Arc<dyn RatingStore>,
    catalog: Arc<dyn MovieCatalog>,
}

/// One scored candidate before deduplication.
struct PoolEntry {
    score: f64,
    reason: String,
}

impl ContentBasedStrategy {
    pub fn new(ratings: Arc<dyn RatingStore>, catalog: Arc<dyn MovieCatalog>) -> Self {
        Self { ratings, catalog }
    }

    /// preference average x normalized movie quality, on a 0-5 scale.
    async fn pool_score(&self, movie_id: &str, preference_avg: f64, quality_floor: f64) -> Option<f64> {
        let stats = match bounded(self.catalog.stats(movie_id)).await {
            Ok(Some(stats)) => stats,
            _ => return None,
        };
        if stats.avg_rating < quality_floor {
            return None;
        }
        Some(preference_avg * (stats.avg_rating / 5.0))
    }

    fn movie_passes(&self, movie: &Movie, profile: &UserProfile, request: &RecommendationRequest) -> bool {
        if !request.include_watched && profile.has_watched(&movie.id) {
            return false;
        }
        if let Some(wanted) = request.genre_filter() {
            if !movie.matches_any_genre(wanted) {
                return false;
            }
        }
        movie.within_year_bounds(request.from_year, request.to_year)
    }

    /// Merge one pool into the candidate map, keeping the higher score on
    /// collision.
    fn merge_entry(candidates: &mut HashMap<MovieId, PoolEntry>, movie_id: MovieId, entry: PoolEntry) {
        match candidates.get_mut(&movie_id) {
            Some(existing) if existing.score >= entry.score => {}
            Some(existing) => *existing = entry,
            None => {
                candidates.insert(movie_id, entry);
            }
        }
    }
}

#[async_trait]
impl ScoringStrategy for ContentBasedStrategy {
    fn name(&self) -> &'static str {
        "content"
    }

    fn score_ceiling(&self) -> f64 {
        5.0
    }

    async fn is_applicable(&self, request: &RecommendationRequest) -> bool {
        match bounded(self.ratings.ratings_for_user(&request.user_id)).await {
            Ok(history) => history.iter().any(|r| r.value >= request.min_rating),
            Err(err) => {
                warn!(user_id = %request.user_id, error = %err, "applicability check failed");
                false
            }
        }
    }

    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    async fn generate(&self, request: &RecommendationRequest) -> Vec<Recommendation> {
        let profile =
            match build_profile(self.ratings.as_ref(), &request.user_id, request.min_rating).await
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

        let genre_prefs = match genre_preferences(self.catalog.as_ref(), &profile).await {
            Ok(prefs) => top_preferences(&prefs, TOP_GENRES),
            Err(err) => {
                warn!(error = %err, "could not mine genre preferences");
                Vec::new()
            }
        };
        let director_prefs = match director_preferences(self.catalog.as_ref(), &profile).await {
            Ok(prefs) => top_preferences(&prefs, TOP_DIRECTORS),
            Err(err) => {
                warn!(error = %err, "could not mine director preferences");
                Vec::new()
            }
        };
        debug!(
            genres = genre_prefs.len(),
            directors = director_prefs.len(),
            "mined taste profile"
        );

        let mut candidates: HashMap<MovieId, PoolEntry> = HashMap::new();

        for (genre, preference_avg) in &genre_prefs {
            let movies = match bounded(self.catalog.movies_by_genre(genre)).await {
                Ok(movies) => movies,
                Err(err) => {
                    warn!(genre, error = %err, "skipping genre pool");
                    continue;
                }
            };
            for movie in movies {
                if !self.movie_passes(&movie, &profile, request) {
                    continue;
                }
                let Some(score) = self
                    .pool_score(&movie.id, *preference_avg, request.min_average_movie_rating)
                    .await
                else {
                    continue;
                };
                Self::merge_entry(
                    &mut candidates,
                    movie.id,
                    PoolEntry {
                        score,
                        reason: format!("Based on your genre preferences: {genre}"),
                    },
                );
            }
        }

        for (director, preference_avg) in &director_prefs {
            let movies = match bounded(self.catalog.movies_by_director(director)).await {
                Ok(movies) => movies,
                Err(err) => {
                    warn!(director, error = %err, "skipping director pool");
                    continue;
                }
            };
            for movie in movies {
                if !self.movie_passes(&movie, &profile, request) {
                    continue;
                }
                let Some(score) = self
                    .pool_score(&movie.id, *preference_avg, request.min_average_movie_rating)
                    .await
                else {
                    continue;
                };
                Self::merge_entry(
                    &mut candidates,
                    movie.id,
                    PoolEntry {
                        score,
                        reason: format!("From directors you rated highly: {director}"),
                    },
                );
            }
        }

        let mut recommendations: Vec<Recommendation> = candidates
            .into_iter()
            .map(|(movie_id, entry)| {
                Recommendation::new(
                    request.user_id.clone(),
                    movie_id,
                    entry.score,
                    self.name(),
                    entry.reason,
                )
            })
            .collect();

        rank_and_truncate(&mut recommendations, request.limit);
        debug!(count = recommendations.len(), "generated content recommendations");
        recommendations
    }

    async fn score(&self, user_id: &str, movie_id: &str) -> f64 {
        let profile = match build_profile(self.ratings.as_ref(), user_id, 3.0).await {
            Ok(profile) => profile,
            Err(_) => return 0.0,
        };
        if profile.liked.is_empty() {
            return 0.0;
        }
        let Ok(Some(movie)) = bounded(self.catalog.movie(movie_id)).await else {
            return 0.0;
        };

        let genre_prefs = genre_preferences(self.catalog.as_ref(), &profile)
            .await
            .unwrap_or_default();
        let director_prefs = director_preferences(self.catalog.as_ref(), &profile)
            .await
            .unwrap_or_default();

        let mut best_preference: f64 = 0.0;
        for genre in &movie.genres {
            if let Some(avg) = genre_prefs.get(&genre.to_ascii_lowercase()) {
                best_preference = best_preference.max(*avg);
            }
        }
        if let Some(director) = &movie.director {
            if let Some(avg) = director_prefs.get(&director.to_ascii_lowercase()) {
                best_preference = best_preference.max(*avg);
            }
        }
        if best_preference == 0.0 {
            return 0.0;
        }

        match self.pool_score(movie_id, best_preference, 0.0).await {
            Some(score) => score,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{MemoryDataset, Movie};

    fn movie(id: &str, genres: &[&str], director: Option<&str>, year: u16) -> Movie {
        Movie {
            id: id.to_string(),
            title: format!("Movie {id}"),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            director: director.map(|d| d.to_string()),
            actors: vec![],
            year: Some(year),
        }
    }

    fn build_dataset() -> Arc<MemoryDataset> {
        let mut data = MemoryDataset::new();
        data.insert_movie(movie("m1", &["Action"], Some("Nolan"), 2000));
        data.insert_movie(movie("m2", &["Action"], Some("Nolan"), 2002));
        data.insert_movie(movie("m3", &["Action"], None, 2004));
        data.insert_movie(movie("m4", &["Romance"], Some("Nolan"), 2006));
        data.insert_movie(movie("m5", &["Romance"], Some("Meyers"), 2008));

        // u1 loves Action and Nolan, lukewarm on Romance.
        data.rate("u1", "m1", 5.0);
        data.rate("u1", "m5", 2.0);

        // Background ratings so candidates carry average scores.
        data.rate("u2", "m2", 4.0);
        data.rate("u2", "m3", 5.0);
        data.rate("u2", "m4", 3.0);
        data.rate("u3", "m2", 5.0);

        Arc::new(data)
    }

    fn strategy(data: &Arc<MemoryDataset>) -> ContentBasedStrategy {
        ContentBasedStrategy::new(data.clone(), data.clone())
    }

    #[tokio::test]
    async fn test_recommends_from_liked_genres_and_directors() {
        let data = build_dataset();
        let recs = strategy(&data)
            .generate(&RecommendationRequest::new("u1"))
            .await;

        let movie_ids: Vec<&str> = recs.iter().map(|r| r.movie_id.as_str()).collect();
        // Action pool: m2, m3. Nolan pool adds m4.
        assert!(movie_ids.contains(&"m2"));
        assert!(movie_ids.contains(&"m3"));
        assert!(movie_ids.contains(&"m4"));
        // m5 is watched, m1 is watched.
        assert!(!movie_ids.contains(&"m1"));
        assert!(!movie_ids.contains(&"m5"));
    }

    #[tokio::test]
    async fn test_dedup_keeps_single_entry_per_movie() {
        let data = build_dataset();
        let recs = strategy(&data)
            .generate(&RecommendationRequest::new("u1"))
            .await;

        // m2 is reachable via both the Action and Nolan pools.
        let m2_count = recs.iter().filter(|r| r.movie_id == "m2").count();
        assert_eq!(m2_count, 1);
    }

    #[tokio::test]
    async fn test_liked_threshold_gates_applicability() {
        let data = build_dataset();
        let strategy = strategy(&data);

        assert!(strategy.is_applicable(&RecommendationRequest::new("u1")).await);
        // u1's best rating is 5.0, so a threshold above that disqualifies.
        let strict = RecommendationRequest::new("u1").with_min_rating(5.5);
        assert!(!strategy.is_applicable(&strict).await);
        assert!(!strategy.is_applicable(&RecommendationRequest::new("nobody")).await);
    }

    #[tokio::test]
    async fn test_quality_floor_excludes_weak_movies() {
        let data = build_dataset();
        let request = RecommendationRequest::new("u1").with_min_average_movie_rating(4.0);
        let recs = strategy(&data).generate(&request).await;

        // m4 averages 3.0 and falls below the floor.
        assert!(!recs.iter().any(|r| r.movie_id == "m4"));
        assert!(recs.iter().any(|r| r.movie_id == "m2"));
    }

    #[tokio::test]
    async fn test_year_filter() {
        let data = build_dataset();
        let request = RecommendationRequest::new("u1").with_year_range(Some(2003), None);
        let recs = strategy(&data).generate(&request).await;

        let movie_ids: Vec<&str> = recs.iter().map(|r| r.movie_id.as_str()).collect();
        assert!(!movie_ids.contains(&"m2"));
        assert!(movie_ids.contains(&"m3"));
    }

    #[tokio::test]
    async fn test_reasons_name_the_matched_preference() {
        let data = build_dataset();
        let recs = strategy(&data)
            .generate(&RecommendationRequest::new("u1"))
            .await;

        let m4 = recs.iter().find(|r| r.movie_id == "m4").unwrap();
        assert!(m4.reason.contains("directors you rated highly"));
    }
}
