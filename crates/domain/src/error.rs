//! Error types for the recommendation engine.
//!
//! Two separate enums reflect the two failure planes:
//! - [`EngineError`]: client errors surfaced to callers (bad algorithm name,
//!   out-of-range request, missing record). Never retried internally.
//! - [`CollaboratorError`]: a rating/catalog/graph call failed or timed out.
//!   Always caught at the strategy boundary and converted to an empty result;
//!   it must never propagate past a strategy.

use thiserror::Error;

/// Client-facing errors. Everything else in the engine degrades to an empty
/// or popularity-only result instead of erroring.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The requested algorithm name is not registered.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The request failed validation (blank user id, limit out of [1, 100], ...).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An interaction was tracked against a (user, movie) pair that has no
    /// stored recommendation record.
    #[error("recommendation not found for user {user_id} and movie {movie_id}")]
    RecommendationNotFound { user_id: String, movie_id: String },
}

/// Failures at the collaborator boundary (rating store, catalog, graph oracle).
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// A bounded timeout elapsed. Treated identically to `Unavailable`.
    #[error("collaborator call timed out")]
    Timeout,
}

/// Convenience alias for collaborator call results.
pub type CollabResult<T> = std::result::Result<T, CollaboratorError>;
