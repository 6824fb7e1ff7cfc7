//! Collaborator contracts the engine consumes.
//!
//! The engine never owns rating, catalog, or graph data; it queries these
//! three surfaces and treats every call as fallible and potentially slow.
//! Callers apply a bounded timeout and handle a failure as "no data", so a
//! collaborator outage can never take down a recommendation run.

use async_trait::async_trait;

use crate::error::CollabResult;
use crate::types::{Movie, MovieStats, Rating, ScoredNode};

/// Read access to rating history.
#[async_trait]
pub trait RatingStore: Send + Sync {
    /// All ratings the user has made.
    async fn ratings_for_user(&self, user_id: &str) -> CollabResult<Vec<Rating>>;

    /// All ratings a movie has received.
    async fn ratings_for_movie(&self, movie_id: &str) -> CollabResult<Vec<Rating>>;

    /// Number of ratings the user has made. Used by cheap applicability checks.
    async fn rating_count(&self, user_id: &str) -> CollabResult<usize>;
}

/// Read access to movie identity, content features, and aggregate statistics.
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    async fn movie(&self, movie_id: &str) -> CollabResult<Option<Movie>>;

    async fn stats(&self, movie_id: &str) -> CollabResult<Option<MovieStats>>;

    /// Full candidate universe. Fine for an in-process catalog; a remote
    /// catalog would page internally.
    async fn all_movies(&self) -> CollabResult<Vec<Movie>>;

    async fn movies_by_genre(&self, genre: &str) -> CollabResult<Vec<Movie>>;

    async fn movies_by_director(&self, director: &str) -> CollabResult<Vec<Movie>>;

    /// Mean rating across the whole catalog, the prior for weighted-rating
    /// popularity scoring.
    async fn global_mean_rating(&self) -> CollabResult<f64>;
}

/// The graph-query surface: precomputed similarity/centrality algorithms over
/// the user-rating-movie graph. The engine treats it as an opaque oracle that
/// takes parameters and returns ranked `(node, score)` rows.
#[async_trait]
pub trait GraphQueries: Send + Sync {
    /// Users most similar to `user_id` by rating pattern, scores in [0, 1],
    /// filtered to `similarity_cutoff` and ranked descending.
    async fn similar_users(
        &self,
        user_id: &str,
        similarity_cutoff: f64,
        limit: usize,
    ) -> CollabResult<Vec<ScoredNode>>;

    /// Global centrality score per movie (a PageRank-style measure over the
    /// rating bipartite graph), ranked descending.
    async fn movie_centrality(&self, limit: usize) -> CollabResult<Vec<ScoredNode>>;

    /// Movies whose genre/director/actor overlap profile is cosine-similar
    /// to the given movie, ranked descending.
    async fn similar_movies(&self, movie_id: &str, limit: usize) -> CollabResult<Vec<ScoredNode>>;
}

// Blanket impls so collaborators can be shared as trait objects or references.

#[async_trait]
impl<T: RatingStore + ?Sized> RatingStore for std::sync::Arc<T> {
    async fn ratings_for_user(&self, user_id: &str) -> CollabResult<Vec<Rating>> {
        (**self).ratings_for_user(user_id).await
    }

    async fn ratings_for_movie(&self, movie_id: &str) -> CollabResult<Vec<Rating>> {
        (**self).ratings_for_movie(movie_id).await
    }

    async fn rating_count(&self, user_id: &str) -> CollabResult<usize> {
        (**self).rating_count(user_id).await
    }
}

#[async_trait]
impl<T: MovieCatalog + ?Sized> MovieCatalog for std::sync::Arc<T> {
    async fn movie(&self, movie_id: &str) -> CollabResult<Option<Movie>> {
        (**self).movie(movie_id).await
    }

    async fn stats(&self, movie_id: &str) -> CollabResult<Option<MovieStats>> {
        (**self).stats(movie_id).await
    }

    async fn all_movies(&self) -> CollabResult<Vec<Movie>> {
        (**self).all_movies().await
    }

    async fn movies_by_genre(&self, genre: &str) -> CollabResult<Vec<Movie>> {
        (**self).movies_by_genre(genre).await
    }

    async fn movies_by_director(&self, director: &str) -> CollabResult<Vec<Movie>> {
        (**self).movies_by_director(director).await
    }

    async fn global_mean_rating(&self) -> CollabResult<f64> {
        (**self).global_mean_rating().await
    }
}

#[async_trait]
impl<T: GraphQueries + ?Sized> GraphQueries for std::sync::Arc<T> {
    async fn similar_users(
        &self,
        user_id: &str,
        similarity_cutoff: f64,
        limit: usize,
    ) -> CollabResult<Vec<ScoredNode>> {
        (**self).similar_users(user_id, similarity_cutoff, limit).await
    }

    async fn movie_centrality(&self, limit: usize) -> CollabResult<Vec<ScoredNode>> {
        (**self).movie_centrality(limit).await
    }

    async fn similar_movies(&self, movie_id: &str, limit: usize) -> CollabResult<Vec<ScoredNode>> {
        (**self).similar_movies(movie_id, limit).await
    }
}
