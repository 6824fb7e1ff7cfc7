//! In-memory dataset implementing all three collaborator traits.
//!
//! Backs the demo binary and test fixtures with hash-map indices over
//! movies and ratings. The [`GraphQueries`] implementation computes its
//! answers locally (cosine similarity over rating vectors, degree-normalized
//! centrality, feature-overlap cosine between movies) so it behaves like a
//! small, deterministic stand-in for the external graph engine.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use rayon::prelude::*;

use crate::collaborators::{GraphQueries, MovieCatalog, RatingStore};
use crate::error::CollabResult;
use crate::types::{Movie, MovieId, MovieStats, Rating, ScoredNode, UserId};

/// In-memory movie/rating store with secondary indices for genre and
/// director lookups.
#[derive(Debug, Default)]
pub struct MemoryDataset {
    movies: HashMap<MovieId, Movie>,
    user_ratings: HashMap<UserId, Vec<Rating>>,
    movie_ratings: HashMap<MovieId, Vec<Rating>>,
    genre_index: HashMap<String, Vec<MovieId>>,
    director_index: HashMap<String, Vec<MovieId>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a movie and update the genre/director indices.
    pub fn insert_movie(&mut self, movie: Movie) {
        for genre in &movie.genres {
            self.genre_index
                .entry(genre.to_ascii_lowercase())
                .or_default()
                .push(movie.id.clone());
        }
        if let Some(director) = &movie.director {
            self.director_index
                .entry(director.to_ascii_lowercase())
                .or_default()
                .push(movie.id.clone());
        }
        self.movies.insert(movie.id.clone(), movie);
    }

    /// Insert a rating into both per-user and per-movie indices.
    pub fn insert_rating(&mut self, rating: Rating) {
        self.user_ratings
            .entry(rating.user_id.clone())
            .or_default()
            .push(rating.clone());
        self.movie_ratings
            .entry(rating.movie_id.clone())
            .or_default()
            .push(rating);
    }

    /// Convenience: record a rating made now.
    pub fn rate(&mut self, user_id: &str, movie_id: &str, value: f64) {
        self.insert_rating(Rating {
            user_id: user_id.to_string(),
            movie_id: movie_id.to_string(),
            value,
            rated_at: Utc::now(),
        });
    }

    /// Counts for debugging/validation: (movies, users, ratings).
    pub fn counts(&self) -> (usize, usize, usize) {
        let total_ratings = self.user_ratings.values().map(|v| v.len()).sum();
        (self.movies.len(), self.user_ratings.len(), total_ratings)
    }

    fn compute_stats(&self, movie_id: &str) -> Option<MovieStats> {
        let ratings = self.movie_ratings.get(movie_id)?;
        if ratings.is_empty() {
            return None;
        }
        let total: f64 = ratings.iter().map(|r| r.value).sum();
        Some(MovieStats {
            avg_rating: total / ratings.len() as f64,
            rating_count: ratings.len() as u32,
        })
    }

    fn rating_vector(&self, user_id: &str) -> HashMap<&str, f64> {
        self.user_ratings
            .get(user_id)
            .map(|ratings| {
                ratings
                    .iter()
                    .map(|r| (r.movie_id.as_str(), r.value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Feature profile used for movie-to-movie similarity: genres, director,
    /// and actors as one flat set of tokens.
    fn feature_set(movie: &Movie) -> HashSet<String> {
        let mut features: HashSet<String> = movie
            .genres
            .iter()
            .map(|g| format!("genre:{}", g.to_ascii_lowercase()))
            .collect();
        if let Some(director) = &movie.director {
            features.insert(format!("director:{}", director.to_ascii_lowercase()));
        }
        for actor in &movie.actors {
            features.insert(format!("actor:{}", actor.to_ascii_lowercase()));
        }
        features
    }
}

/// Cosine similarity over the movies two users have both rated. Returns 0.0
/// with fewer than two shared ratings to avoid degenerate 1.0 similarities.
fn user_cosine(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
    let common: Vec<&str> = a.keys().filter(|m| b.contains_key(*m)).copied().collect();
    if common.len() < 2 {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for movie in common {
        let ra = a[movie];
        let rb = b[movie];
        dot += ra * rb;
        norm_a += ra * ra;
        norm_b += rb * rb;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[async_trait]
impl RatingStore for MemoryDataset {
    async fn ratings_for_user(&self, user_id: &str) -> CollabResult<Vec<Rating>> {
        Ok(self.user_ratings.get(user_id).cloned().unwrap_or_default())
    }

    async fn ratings_for_movie(&self, movie_id: &str) -> CollabResult<Vec<Rating>> {
        Ok(self.movie_ratings.get(movie_id).cloned().unwrap_or_default())
    }

    async fn rating_count(&self, user_id: &str) -> CollabResult<usize> {
        Ok(self.user_ratings.get(user_id).map(|v| v.len()).unwrap_or(0))
    }
}

#[async_trait]
impl MovieCatalog for MemoryDataset {
    async fn movie(&self, movie_id: &str) -> CollabResult<Option<Movie>> {
        Ok(self.movies.get(movie_id).cloned())
    }

    async fn stats(&self, movie_id: &str) -> CollabResult<Option<MovieStats>> {
        Ok(self.compute_stats(movie_id))
    }

    async fn all_movies(&self) -> CollabResult<Vec<Movie>> {
        Ok(self.movies.values().cloned().collect())
    }

    async fn movies_by_genre(&self, genre: &str) -> CollabResult<Vec<Movie>> {
        let ids = self
            .genre_index
            .get(&genre.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| self.movies.get(id).cloned()).collect())
    }

    async fn movies_by_director(&self, director: &str) -> CollabResult<Vec<Movie>> {
        let ids = self
            .director_index
            .get(&director.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        Ok(ids.iter().filter_map(|id| self.movies.get(id).cloned()).collect())
    }

    async fn global_mean_rating(&self) -> CollabResult<f64> {
        let mut total = 0.0;
        let mut count = 0usize;
        for ratings in self.movie_ratings.values() {
            total += ratings.iter().map(|r| r.value).sum::<f64>();
            count += ratings.len();
        }
        if count == 0 {
            return Ok(0.0);
        }
        Ok(total / count as f64)
    }
}

#[async_trait]
impl GraphQueries for MemoryDataset {
    async fn similar_users(
        &self,
        user_id: &str,
        similarity_cutoff: f64,
        limit: usize,
    ) -> CollabResult<Vec<ScoredNode>> {
        let target = self.rating_vector(user_id);
        if target.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredNode> = self
            .user_ratings
            .par_iter()
            .filter(|(other_id, _)| other_id.as_str() != user_id)
            .filter_map(|(other_id, ratings)| {
                let other: HashMap<&str, f64> = ratings
                    .iter()
                    .map(|r| (r.movie_id.as_str(), r.value))
                    .collect();
                let similarity = user_cosine(&target, &other);
                (similarity >= similarity_cutoff).then(|| ScoredNode {
                    id: other_id.clone(),
                    score: similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn movie_centrality(&self, limit: usize) -> CollabResult<Vec<ScoredNode>> {
        let total_ratings: usize = self.movie_ratings.values().map(|v| v.len()).sum();
        if total_ratings == 0 {
            return Ok(Vec::new());
        }

        // Degree-normalized share of the rating graph per movie.
        let mut scored: Vec<ScoredNode> = self
            .movie_ratings
            .iter()
            .map(|(movie_id, ratings)| ScoredNode {
                id: movie_id.clone(),
                score: ratings.len() as f64 / total_ratings as f64,
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn similar_movies(&self, movie_id: &str, limit: usize) -> CollabResult<Vec<ScoredNode>> {
        let Some(anchor) = self.movies.get(movie_id) else {
            return Ok(Vec::new());
        };
        let anchor_features = Self::feature_set(anchor);
        if anchor_features.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredNode> = self
            .movies
            .values()
            .filter(|other| other.id != movie_id)
            .filter_map(|other| {
                let other_features = Self::feature_set(other);
                let shared = anchor_features.intersection(&other_features).count();
                if shared == 0 {
                    return None;
                }
                let similarity = shared as f64
                    / ((anchor_features.len() as f64).sqrt() * (other_features.len() as f64).sqrt());
                Some(ScoredNode {
                    id: other.id.clone(),
                    score: similarity,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}
