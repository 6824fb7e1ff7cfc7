//! Core domain types for the recommendation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;

// =============================================================================
// Type Aliases
// =============================================================================
// Ids are opaque strings assigned by the surrounding catalog/identity services.

/// Unique identifier for a user
pub type UserId = String;

/// Unique identifier for a movie
pub type MovieId = String;

// =============================================================================
// Recommendation Record
// =============================================================================

/// A single generated recommendation for a (user, movie) pair.
///
/// This is the only persisted entity in the engine: a user's set lives until
/// the next refresh for that user or an age-based cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub user_id: UserId,
    pub movie_id: MovieId,
    /// Ranking key, higher is better. The scale depends on the producing
    /// strategy; the hybrid blender normalizes to 0-1 before combining.
    pub score: f64,
    /// Name of the strategy that produced this entry ("hybrid" for blends).
    pub algorithm: String,
    /// Human-readable justification. Display only, never used for ranking.
    pub reason: String,
    pub recommended_at: DateTime<Utc>,
    /// Interaction flags, flipped by the orchestration layer after generation.
    pub clicked: bool,
    pub watched: bool,
}

impl Recommendation {
    pub fn new(
        user_id: impl Into<UserId>,
        movie_id: impl Into<MovieId>,
        score: f64,
        algorithm: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            movie_id: movie_id.into(),
            score,
            algorithm: algorithm.into(),
            reason: reason.into(),
            recommended_at: Utc::now(),
            clicked: false,
            watched: false,
        }
    }
}

// =============================================================================
// Movie-related Types
// =============================================================================

/// Movie identity and content features as returned by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub genres: Vec<String>,
    pub director: Option<String>,
    pub actors: Vec<String>,
    pub year: Option<u16>,
}

impl Movie {
    /// Case-insensitive genre membership check (OR semantics over `wanted`).
    pub fn matches_any_genre(&self, wanted: &[String]) -> bool {
        self.genres.iter().any(|g| {
            wanted.iter().any(|w| g.eq_ignore_ascii_case(w))
        })
    }

    /// Whether the release year falls inside the optional bounds.
    pub fn within_year_bounds(&self, from: Option<u16>, to: Option<u16>) -> bool {
        match self.year {
            Some(year) => from.map_or(true, |f| year >= f) && to.map_or(true, |t| year <= t),
            // Movies with an unknown year pass unless a bound was requested.
            None => from.is_none() && to.is_none(),
        }
    }
}

/// Aggregate rating statistics for a movie.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MovieStats {
    /// Average rating on the 0-5 scale.
    pub avg_rating: f64,
    pub rating_count: u32,
}

// =============================================================================
// Rating Type
// =============================================================================

/// A single rating a user gave a movie, on a 0-5 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub movie_id: MovieId,
    pub value: f64,
    pub rated_at: DateTime<Utc>,
}

// =============================================================================
// Graph Oracle Rows
// =============================================================================

/// A ranked node returned by the graph-query surface: a node id paired with
/// the algorithm's numeric score (similarity, centrality, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub id: String,
    pub score: f64,
}

// =============================================================================
// Paging
// =============================================================================

/// One page of results from a paginated read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub page_size: usize,
    /// Total number of items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            page_size,
            total: 0,
        }
    }
}

/// Sort key for paginated recommendation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Score,
    RecommendedAt,
}

impl FromStr for SortBy {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(Self::Score),
            "recommendedAt" | "recommended_at" => Ok(Self::RecommendedAt),
            other => Err(EngineError::InvalidRequest(format!(
                "unsupported sort field: {other}"
            ))),
        }
    }
}

/// Sort direction for paginated recommendation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl FromStr for SortDir {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(EngineError::InvalidRequest(format!(
                "unsupported sort direction: {other}"
            ))),
        }
    }
}
