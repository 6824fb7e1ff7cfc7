//! End-to-end tests for the recommendation service: generation, dispatch,
//! caching, interactions, batch runs, and cleanup.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use async_trait::async_trait;

use domain::{
    CollabResult, CollaboratorError, EngineError, GraphQueries, MemoryDataset, Movie,
    MovieCatalog, MovieStats, Rating, RatingStore, Recommendation, RecommendationRequest,
    ScoredNode, SortBy, SortDir,
};
use engine::{
    RecommendationCache, RecommendationService, RecommendationStore, RegistryConfig,
    StrategyRegistry,
};

fn movie(id: &str, title: &str, genres: &[&str], director: Option<&str>, year: u16) -> Movie {
    Movie {
        id: id.to_string(),
        title: title.to_string(),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        director: director.map(|d| d.to_string()),
        actors: vec![],
        year: Some(year),
    }
}

/// A small catalog with an established user ("alice"), her taste twin
/// ("bob"), and a crowd pushing two popular titles.
fn build_dataset() -> Arc<MemoryDataset> {
    let mut data = MemoryDataset::new();
    data.insert_movie(movie("m1", "First Strike", &["Action"], Some("Nolan"), 1998));
    data.insert_movie(movie("m2", "Second Strike", &["Action"], Some("Nolan"), 2001));
    data.insert_movie(movie("m3", "Third Strike", &["Action"], Some("Nolan"), 2004));
    data.insert_movie(movie("m4", "Quiet Lives", &["Drama"], Some("Scott"), 2006));
    data.insert_movie(movie("m5", "Quieter Lives", &["Drama"], Some("Scott"), 2009));
    data.insert_movie(movie("m6", "Crowd Pleaser", &["Action", "Drama"], None, 2012));
    data.insert_movie(movie("m7", "Crowd Teaser", &["Drama"], None, 2015));

    // alice - established Action fan.
    data.rate("alice", "m1", 5.0);
    data.rate("alice", "m2", 4.5);
    data.rate("alice", "m4", 2.0);

    // bob - taste twin who also loves m3 and m5.
    data.rate("bob", "m1", 5.0);
    data.rate("bob", "m2", 4.5);
    data.rate("bob", "m4", 2.0);
    data.rate("bob", "m3", 5.0);
    data.rate("bob", "m5", 4.5);

    // Crowd signal for popularity.
    for i in 0..30 {
        data.rate(&format!("crowd{i}"), "m6", 4.3);
        data.rate(&format!("crowd{i}"), "m7", 3.9);
    }

    Arc::new(data)
}

fn service_with(data: &Arc<MemoryDataset>, config: RegistryConfig) -> RecommendationService {
    let registry = Arc::new(StrategyRegistry::with_config(
        data.clone(),
        data.clone(),
        data.clone(),
        config,
    ));
    RecommendationService::new(registry, data.clone())
}

fn deterministic_service(data: &Arc<MemoryDataset>) -> RecommendationService {
    service_with(
        data,
        RegistryConfig {
            jitter_amplitude: 0.0,
            jitter_seed: None,
        },
    )
}

// ============================================================================
// Generation and dispatch
// ============================================================================

#[tokio::test]
async fn test_generate_hybrid_for_established_user() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let views = service
        .generate(RecommendationRequest::new("alice").with_limit(5))
        .await
        .unwrap();

    assert!(!views.is_empty());
    assert!(views.len() <= 5);
    for view in &views {
        assert_eq!(view.algorithm, "hybrid");
        assert!(view.score >= 0.0 && view.score <= 1.0);
        // Watched movies stay out.
        assert!(!["m1", "m2", "m4"].contains(&view.movie_id.as_str()));
    }
    for window in views.windows(2) {
        assert!(window[0].score >= window[1].score);
    }
    // Views carry catalog metadata.
    assert!(views.iter().all(|v| v.title.is_some()));
}

#[tokio::test]
async fn test_generate_rejects_unknown_algorithm() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let result = service
        .generate(RecommendationRequest::new("alice").with_algorithm("oracle-of-delphi"))
        .await;
    assert!(matches!(result, Err(EngineError::UnknownAlgorithm(_))));
}

#[tokio::test]
async fn test_generate_rejects_invalid_request() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let blank = service.generate(RecommendationRequest::new("  ")).await;
    assert!(matches!(blank, Err(EngineError::InvalidRequest(_))));

    let oversized = service
        .generate(RecommendationRequest::new("alice").with_limit(500))
        .await;
    assert!(matches!(oversized, Err(EngineError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_cold_user_collaborative_substitutes_popularity() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let views = service
        .generate(RecommendationRequest::new("newcomer").with_algorithm("collaborative"))
        .await
        .unwrap();

    assert!(!views.is_empty());
    // The substitute's own name is what lands on the records.
    assert!(views.iter().all(|v| v.algorithm == "popular"));
    assert_eq!(views[0].movie_id, "m6");
}

#[tokio::test]
async fn test_new_user_hybrid_ranks_like_popularity() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let hybrid = service
        .generate(RecommendationRequest::new("newcomer"))
        .await
        .unwrap();
    let popular = service
        .generate(RecommendationRequest::new("newcomer-2").with_algorithm("popular"))
        .await
        .unwrap();

    assert!(hybrid.iter().all(|v| v.algorithm == "hybrid"));
    let hybrid_ids: Vec<&str> = hybrid.iter().map(|v| v.movie_id.as_str()).collect();
    let popular_ids: Vec<&str> = popular.iter().map(|v| v.movie_id.as_str()).collect();
    assert_eq!(hybrid_ids, popular_ids);
}

#[tokio::test]
async fn test_zero_jitter_generation_is_deterministic() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let first = service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();
    let second = service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();

    let first_ids: Vec<&str> = first.iter().map(|v| v.movie_id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|v| v.movie_id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn test_genre_filter_restricts_results() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let views = service
        .generate(
            RecommendationRequest::new("alice")
                .with_algorithm("popular")
                .with_genre(vec!["Drama".to_string()]),
        )
        .await
        .unwrap();

    assert!(!views.is_empty());
    for view in &views {
        assert!(view.genres.iter().any(|g| g == "Drama"));
    }
}

// ============================================================================
// Reads, refresh, and caching
// ============================================================================

#[tokio::test]
async fn test_paged_reads_after_generation() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    service
        .generate(RecommendationRequest::new("alice").with_limit(4))
        .await
        .unwrap();

    let page = service
        .user_recommendations("alice", 0, 2, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.total >= 2);
    assert!(page.items[0].score >= page.items[1].score);

    let ascending = service
        .user_recommendations("alice", 0, 2, SortBy::Score, SortDir::Asc)
        .await
        .unwrap();
    assert!(ascending.items[0].score <= ascending.items[1].score);
}

#[tokio::test]
async fn test_read_for_unknown_user_is_empty_page() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let page = service
        .user_recommendations("ghost", 0, 10, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn test_zero_page_size_rejected() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let result = service
        .user_recommendations("alice", 0, 0, SortBy::Score, SortDir::Desc)
        .await;
    assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_refresh_replaces_stored_set() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    service
        .generate(RecommendationRequest::new("alice").with_algorithm("popular"))
        .await
        .unwrap();
    let before = service
        .user_recommendations("alice", 0, 50, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert!(before.items.iter().all(|v| v.algorithm == "popular"));

    let refreshed = service.refresh("alice", "hybrid", 10).await.unwrap();
    assert!(refreshed.iter().all(|v| v.algorithm == "hybrid"));

    // Reads now serve only the refreshed set.
    let after = service
        .user_recommendations("alice", 0, 50, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert_eq!(after.total, refreshed.len());
    assert!(after.items.iter().all(|v| v.algorithm == "hybrid"));
}

#[tokio::test]
async fn test_refresh_honors_algorithm_and_limit() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();

    let refreshed = service.refresh("alice", "popular", 2).await.unwrap();
    assert!(!refreshed.is_empty());
    assert!(refreshed.len() <= 2);
    assert!(refreshed.iter().all(|v| v.algorithm == "popular"));

    // Bad arguments go through the same validation as generate.
    let unknown = service.refresh("alice", "mystery", 5).await;
    assert!(matches!(unknown, Err(EngineError::UnknownAlgorithm(_))));
    let oversized = service.refresh("alice", "popular", 500).await;
    assert!(matches!(oversized, Err(EngineError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_filter_by_algorithm() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();

    let hybrid_only = service
        .user_recommendations_by_algorithm("alice", "hybrid")
        .await
        .unwrap();
    assert!(!hybrid_only.is_empty());

    let popular_only = service
        .user_recommendations_by_algorithm("alice", "popular")
        .await
        .unwrap();
    assert!(popular_only.is_empty());

    let unknown = service
        .user_recommendations_by_algorithm("alice", "mystery")
        .await;
    assert!(matches!(unknown, Err(EngineError::UnknownAlgorithm(_))));
}

// ============================================================================
// Interactions
// ============================================================================

#[tokio::test]
async fn test_mark_clicked_and_watched_flow_into_stats() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let views = service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();
    let first = views[0].movie_id.clone();

    service.mark_clicked("alice", &first).await.unwrap();
    service.mark_watched("alice", &first).await.unwrap();

    let stats = service.recommendation_stats("alice").await;
    assert_eq!(stats.clicked, 1);
    assert_eq!(stats.watched, 1);
    assert_eq!(stats.total, views.len());
    assert!(stats.click_through_rate > 0.0);
    assert_eq!(stats.by_algorithm["hybrid"], views.len());
}

#[tokio::test]
async fn test_mark_watched_unknown_pair_errors() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();

    let result = service.mark_watched("alice", "never-recommended").await;
    assert!(matches!(
        result,
        Err(EngineError::RecommendationNotFound { .. })
    ));
}

#[tokio::test]
async fn test_track_interaction_actions() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let views = service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();
    let first = views[0].movie_id.clone();

    service.track_interaction("alice", &first, "view").await;
    service.track_interaction("alice", &first, "watch").await;
    // Logged-only and unknown actions must not fail or change flags.
    service.track_interaction("alice", &first, "like").await;
    service.track_interaction("alice", &first, "teleport").await;
    // Missing record is swallowed.
    service.track_interaction("alice", "no-such-movie", "click").await;

    let stats = service.recommendation_stats("alice").await;
    assert_eq!(stats.clicked, 1);
    assert_eq!(stats.watched, 1);
}

// ============================================================================
// Batch generation
// ============================================================================

#[tokio::test]
async fn test_batch_generates_per_user_with_error_isolation() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    // The blank user id fails validation; the others succeed.
    let job = service.batch_generate(
        vec!["alice".to_string(), "   ".to_string(), "bob".to_string()],
        "hybrid",
    );
    let summary = job.wait().await;

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failed, 1);
    assert!(!summary.cancelled);

    let alice = service
        .user_recommendations("alice", 0, 10, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert!(!alice.items.is_empty());
}

#[tokio::test]
async fn test_batch_cancellation_stops_early() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let users: Vec<String> = (0..50).map(|i| format!("batch-user-{i}")).collect();
    let job = service.batch_generate(users, "hybrid");
    job.cancel().await;
    let summary = job.wait().await;

    assert!(summary.cancelled);
    assert!(summary.processed + summary.failed < 50);
}

#[tokio::test]
async fn test_batch_targets_requested_algorithm() {
    let data = build_dataset();
    let service = deterministic_service(&data);

    let job = service.batch_generate(vec!["alice".to_string()], "popular");
    let summary = job.wait().await;
    assert_eq!(summary.processed, 1);

    let popular = service
        .user_recommendations_by_algorithm("alice", "popular")
        .await
        .unwrap();
    assert!(!popular.is_empty());
    let hybrid = service
        .user_recommendations_by_algorithm("alice", "hybrid")
        .await
        .unwrap();
    assert!(hybrid.is_empty());
}

// ============================================================================
// Cleanup
// ============================================================================

#[tokio::test]
async fn test_cleanup_removes_only_records_past_cutoff() {
    let data = build_dataset();
    let registry = Arc::new(StrategyRegistry::with_config(
        data.clone(),
        data.clone(),
        data.clone(),
        RegistryConfig {
            jitter_amplitude: 0.0,
            jitter_seed: None,
        },
    ));
    let store = Arc::new(RecommendationStore::new());
    let cache = Arc::new(RecommendationCache::new());
    let service = RecommendationService::with_components(
        registry,
        data.clone(),
        store.clone(),
        cache,
    );

    let mut stale = Recommendation::new("alice", "m3", 0.9, "hybrid", "r");
    stale.recommended_at = Utc::now() - ChronoDuration::days(31);
    let mut borderline = Recommendation::new("alice", "m5", 0.8, "hybrid", "r");
    borderline.recommended_at = Utc::now() - ChronoDuration::days(29);
    store.replace_for_user("alice", vec![stale, borderline]).await;

    let removed = service.cleanup(30).await;
    assert_eq!(removed, 1);

    let remaining = service
        .user_recommendations("alice", 0, 10, SortBy::Score, SortDir::Desc)
        .await
        .unwrap();
    assert_eq!(remaining.total, 1);
    assert_eq!(remaining.items[0].movie_id, "m5");
}

// ============================================================================
// Collaborator outage
// ============================================================================

/// All three collaborator surfaces down at once.
struct Outage;

fn down<T>() -> CollabResult<T> {
    Err(CollaboratorError::Unavailable("collaborator down".to_string()))
}

#[async_trait]
impl RatingStore for Outage {
    async fn ratings_for_user(&self, _user_id: &str) -> CollabResult<Vec<Rating>> {
        down()
    }

    async fn ratings_for_movie(&self, _movie_id: &str) -> CollabResult<Vec<Rating>> {
        down()
    }

    async fn rating_count(&self, _user_id: &str) -> CollabResult<usize> {
        down()
    }
}

#[async_trait]
impl MovieCatalog for Outage {
    async fn movie(&self, _movie_id: &str) -> CollabResult<Option<Movie>> {
        down()
    }

    async fn stats(&self, _movie_id: &str) -> CollabResult<Option<MovieStats>> {
        down()
    }

    async fn all_movies(&self) -> CollabResult<Vec<Movie>> {
        down()
    }

    async fn movies_by_genre(&self, _genre: &str) -> CollabResult<Vec<Movie>> {
        down()
    }

    async fn movies_by_director(&self, _director: &str) -> CollabResult<Vec<Movie>> {
        down()
    }

    async fn global_mean_rating(&self) -> CollabResult<f64> {
        down()
    }
}

#[async_trait]
impl GraphQueries for Outage {
    async fn similar_users(
        &self,
        _user_id: &str,
        _similarity_cutoff: f64,
        _limit: usize,
    ) -> CollabResult<Vec<ScoredNode>> {
        down()
    }

    async fn movie_centrality(&self, _limit: usize) -> CollabResult<Vec<ScoredNode>> {
        down()
    }

    async fn similar_movies(&self, _movie_id: &str, _limit: usize) -> CollabResult<Vec<ScoredNode>> {
        down()
    }
}

#[tokio::test]
async fn test_total_outage_yields_empty_set_not_error() {
    let outage = Arc::new(Outage);
    let registry = Arc::new(StrategyRegistry::with_config(
        outage.clone(),
        outage.clone(),
        outage.clone(),
        RegistryConfig {
            jitter_amplitude: 0.0,
            jitter_seed: None,
        },
    ));
    let service = RecommendationService::new(registry, outage.clone());

    // Worst case is an empty list, never a surfaced collaborator error.
    let hybrid = service
        .generate(RecommendationRequest::new("alice"))
        .await
        .unwrap();
    assert!(hybrid.is_empty());

    let popular = service
        .generate(RecommendationRequest::new("alice").with_algorithm("popular"))
        .await
        .unwrap();
    assert!(popular.is_empty());

    // Client-plane errors still surface as usual.
    let unknown = service
        .generate(RecommendationRequest::new("alice").with_algorithm("mystery"))
        .await;
    assert!(matches!(unknown, Err(EngineError::UnknownAlgorithm(_))));
}
