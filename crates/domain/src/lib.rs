//! # Domain Crate
//!
//! Core types and collaborator contracts for the recommendation engine.
//!
//! ## Components
//!
//! - [`types`]: the recommendation record, movie/rating models, paging
//! - [`request`]: the request contract with validation
//! - [`error`]: client-facing and collaborator-boundary error enums
//! - [`collaborators`]: async traits for the rating store, movie catalog,
//!   and graph-query oracle the engine consumes
//! - [`memory`]: an in-memory dataset implementing all three collaborator
//!   traits, used by the demo binary and test fixtures

pub mod collaborators;
pub mod error;
pub mod memory;
pub mod request;
pub mod types;

// Re-export commonly used types
pub use collaborators::{GraphQueries, MovieCatalog, RatingStore};
pub use error::{CollabResult, CollaboratorError, EngineError};
pub use memory::MemoryDataset;
pub use request::RecommendationRequest;
pub use types::{
    Movie, MovieId, MovieStats, Page, Rating, Recommendation, ScoredNode, SortBy, SortDir, UserId,
};
