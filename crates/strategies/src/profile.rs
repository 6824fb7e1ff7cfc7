//! Build a per-request snapshot of the user's rating history.
//!
//! Strategies gather the history once upfront instead of re-querying the
//! rating store during candidate scoring: a watched set for O(1) exclusion
//! checks, the liked subset for preference mining, and the raw vector for
//! similarity math.

use std::collections::{HashMap, HashSet};

use domain::{CollabResult, MovieCatalog, MovieId, Rating, RatingStore, UserId};

use crate::traits::bounded;

/// Aggregated view of one user's rating history.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Every movie the user has rated, regardless of value.
    pub watched: HashSet<MovieId>,
    /// Ratings at or above the liked threshold used to build the profile.
    pub liked: Vec<Rating>,
    /// movie id -> rating value, for cosine similarity against other users.
    pub rating_vector: HashMap<MovieId, f64>,
    pub avg_rating: f64,
}

impl UserProfile {
    pub fn rating_count(&self) -> usize {
        self.rating_vector.len()
    }

    pub fn has_watched(&self, movie_id: &str) -> bool {
        self.watched.contains(movie_id)
    }
}

/// Fetch and aggregate the user's ratings. `liked_threshold` decides which
/// ratings land in the liked subset.
pub async fn build_profile<R: RatingStore + ?Sized>(
    ratings: &R,
    user_id: &str,
    liked_threshold: f64,
) -> CollabResult<UserProfile> {
    let history = bounded(ratings.ratings_for_user(user_id)).await?;

    let mut watched = HashSet::with_capacity(history.len());
    let mut rating_vector = HashMap::with_capacity(history.len());
    let mut liked = Vec::new();
    let mut total = 0.0;

    for rating in &history {
        watched.insert(rating.movie_id.clone());
        rating_vector.insert(rating.movie_id.clone(), rating.value);
        total += rating.value;
        if rating.value >= liked_threshold {
            liked.push(rating.clone());
        }
    }

    let avg_rating = if history.is_empty() {
        0.0
    } else {
        total / history.len() as f64
    };

    Ok(UserProfile {
        user_id: user_id.to_string(),
        watched,
        liked,
        rating_vector,
        avg_rating,
    })
}

/// Average rating the user gave per genre, mined from the liked subset.
/// Genre keys are lowercased so lookups are case-insensitive.
pub async fn genre_preferences<C: MovieCatalog + ?Sized>(
    catalog: &C,
    profile: &UserProfile,
) -> CollabResult<HashMap<String, f64>> {
    let mut stats: HashMap<String, (f64, u32)> = HashMap::new();
    for rating in &profile.liked {
        if let Some(movie) = bounded(catalog.movie(&rating.movie_id)).await? {
            for genre in &movie.genres {
                let entry = stats.entry(genre.to_ascii_lowercase()).or_insert((0.0, 0));
                entry.0 += rating.value;
                entry.1 += 1;
            }
        }
    }

    Ok(stats
        .into_iter()
        .map(|(genre, (sum, count))| (genre, sum / count as f64))
        .collect())
}

/// Average rating the user gave per director, mined from the liked subset.
pub async fn director_preferences<C: MovieCatalog + ?Sized>(
    catalog: &C,
    profile: &UserProfile,
) -> CollabResult<HashMap<String, f64>> {
    let mut stats: HashMap<String, (f64, u32)> = HashMap::new();
    for rating in &profile.liked {
        if let Some(movie) = bounded(catalog.movie(&rating.movie_id)).await? {
            if let Some(director) = &movie.director {
                let entry = stats
                    .entry(director.to_ascii_lowercase())
                    .or_insert((0.0, 0));
                entry.0 += rating.value;
                entry.1 += 1;
            }
        }
    }

    Ok(stats
        .into_iter()
        .map(|(director, (sum, count))| (director, sum / count as f64))
        .collect())
}

/// Rank a preference map descending and keep the strongest `top_n` entries.
pub fn top_preferences(preferences: &HashMap<String, f64>, top_n: usize) -> Vec<(String, f64)> {
    let mut ranked: Vec<(String, f64)> = preferences
        .iter()
        .map(|(key, avg)| (key.clone(), *avg))
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_n);
    ranked
}
