//! Orchestration layer: strategy registry, persisted recommendation sets,
//! read-through caching, and the service facade that ties them together.

pub mod cache;
pub mod registry;
pub mod response;
pub mod service;
pub mod store;

pub use cache::RecommendationCache;
pub use registry::{RegistryConfig, StrategyRegistry};
pub use response::{RecommendationStats, RecommendationView};
pub use service::{BatchJob, BatchSummary, RecommendationService};
pub use store::RecommendationStore;
