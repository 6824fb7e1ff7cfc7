//! Scoring strategies: the interchangeable algorithms that turn a
//! recommendation request into a ranked list of scored movies.
//!
//! Every strategy implements [`ScoringStrategy`] and degrades to an empty
//! result on collaborator failure; only the orchestration layer above decides
//! what to do with an empty list.

pub mod collaborative;
pub mod content;
pub mod graph;
pub mod hybrid;
pub mod popularity;
pub mod profile;
pub mod traits;

pub use collaborative::CollaborativeStrategy;
pub use content::ContentBasedStrategy;
pub use graph::{
    GraphCentralityStrategy, GraphCollaborativeStrategy, GraphContentStrategy, GraphHybridStrategy,
};
pub use hybrid::HybridStrategy;
pub use popularity::PopularityStrategy;
pub use profile::UserProfile;
pub use traits::{bounded, ScoringStrategy, COLLABORATOR_TIMEOUT};
