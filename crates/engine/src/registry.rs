//! Strategy registry and request dispatch.
//!
//! Every strategy is constructed once at startup and shared behind an `Arc`.
//! Dispatch resolves the requested algorithm name, checks applicability for
//! the concrete user, and substitutes the always-applicable popularity
//! strategy when the requested one cannot serve them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use domain::{EngineError, GraphQueries, MovieCatalog, RatingStore, RecommendationRequest};
use strategies::{
    CollaborativeStrategy, ContentBasedStrategy, GraphCentralityStrategy,
    GraphCollaborativeStrategy, GraphContentStrategy, GraphHybridStrategy, HybridStrategy,
    PopularityStrategy, ScoringStrategy,
};

/// Tuning knobs applied at registry construction.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Hybrid ranking jitter amplitude; 0.0 disables jitter.
    pub jitter_amplitude: f64,
    /// Pin the jitter RNG, for reproducible ranking.
    pub jitter_seed: Option<u64>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            jitter_amplitude: 0.05,
            jitter_seed: None,
        }
    }
}

/// Name -> strategy table plus the popularity fallback.
pub struct StrategyRegistry {
    strategies: HashMap<&'static str, Arc<dyn ScoringStrategy>>,
    fallback: Arc<dyn ScoringStrategy>,
}

impl StrategyRegistry {
    pub fn new(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        graph: Arc<dyn GraphQueries>,
    ) -> Self {
        Self::with_config(ratings, catalog, graph, RegistryConfig::default())
    }

    pub fn with_config(
        ratings: Arc<dyn RatingStore>,
        catalog: Arc<dyn MovieCatalog>,
        graph: Arc<dyn GraphQueries>,
        config: RegistryConfig,
    ) -> Self {
        let collaborative: Arc<dyn ScoringStrategy> = Arc::new(CollaborativeStrategy::new(
            ratings.clone(),
            catalog.clone(),
        ));
        let content: Arc<dyn ScoringStrategy> =
            Arc::new(ContentBasedStrategy::new(ratings.clone(), catalog.clone()));
        let popularity: Arc<dyn ScoringStrategy> =
            Arc::new(PopularityStrategy::new(ratings.clone(), catalog.clone()));

        let mut hybrid = HybridStrategy::new(
            collaborative.clone(),
            content.clone(),
            popularity.clone(),
        )
        .with_jitter_amplitude(config.jitter_amplitude);
        if let Some(seed) = config.jitter_seed {
            hybrid = hybrid.with_jitter_seed(seed);
        }

        let graph_collaborative: Arc<dyn ScoringStrategy> = Arc::new(
            GraphCollaborativeStrategy::new(ratings.clone(), catalog.clone(), graph.clone()),
        );
        let graph_centrality: Arc<dyn ScoringStrategy> = Arc::new(GraphCentralityStrategy::new(
            ratings.clone(),
            catalog.clone(),
            graph.clone(),
        ));
        let graph_content: Arc<dyn ScoringStrategy> =
            Arc::new(GraphContentStrategy::new(ratings, catalog, graph));
        let graph_hybrid: Arc<dyn ScoringStrategy> = Arc::new(GraphHybridStrategy::new(
            graph_collaborative.clone(),
            graph_content.clone(),
            graph_centrality.clone(),
        ));

        let mut strategies: HashMap<&'static str, Arc<dyn ScoringStrategy>> = HashMap::new();
        for strategy in [
            collaborative,
            content,
            popularity.clone(),
            Arc::new(hybrid) as Arc<dyn ScoringStrategy>,
            graph_collaborative,
            graph_centrality,
            graph_content,
            graph_hybrid,
        ] {
            strategies.insert(strategy.name(), strategy);
        }
        info!(count = strategies.len(), "registered scoring strategies");

        Self {
            strategies,
            fallback: popularity,
        }
    }

    /// Look up a strategy by its registry name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn ScoringStrategy>, EngineError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownAlgorithm(name.to_string()))
    }

    /// All registered names, sorted for stable presentation.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.strategies.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Resolve the strategy for a request. Unknown names are a client error;
    /// a known but inapplicable strategy substitutes the popularity fallback.
    pub async fn select(
        &self,
        request: &RecommendationRequest,
    ) -> Result<Arc<dyn ScoringStrategy>, EngineError> {
        let strategy = self.get(&request.algorithm)?;
        if strategy.is_applicable(request).await {
            return Ok(strategy);
        }
        warn!(
            user_id = %request.user_id,
            algorithm = %request.algorithm,
            "strategy not applicable, substituting popularity"
        );
        Ok(self.fallback.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::MemoryDataset;

    fn registry() -> StrategyRegistry {
        let mut data = MemoryDataset::new();
        data.rate("u1", "m1", 5.0);
        data.rate("u1", "m2", 5.0);
        data.rate("u1", "m3", 5.0);
        let data = Arc::new(data);
        StrategyRegistry::new(data.clone(), data.clone(), data)
    }

    #[test]
    fn test_all_strategies_registered() {
        let names = registry().names();
        assert_eq!(
            names,
            vec![
                "collaborative",
                "content",
                "graph-centrality",
                "graph-collaborative",
                "graph-content",
                "graph-hybrid",
                "hybrid",
                "popular",
            ]
        );
    }

    #[test]
    fn test_unknown_algorithm_is_an_error() {
        let result = registry().get("mystery");
        assert!(matches!(result, Err(EngineError::UnknownAlgorithm(_))));
    }

    #[tokio::test]
    async fn test_select_substitutes_popularity_for_cold_users() {
        let registry = registry();

        let applicable = RecommendationRequest::new("u1").with_algorithm("collaborative");
        let chosen = registry.select(&applicable).await.unwrap();
        assert_eq!(chosen.name(), "collaborative");

        let cold = RecommendationRequest::new("nobody").with_algorithm("collaborative");
        let substituted = registry.select(&cold).await.unwrap();
        assert_eq!(substituted.name(), "popular");
    }
}
