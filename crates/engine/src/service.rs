//! The recommendation service facade.
//!
//! Owns the strategy registry, the persisted store, and the per-user cache,
//! and exposes the operations callers actually use: generate, paged reads,
//! interaction tracking, batch generation, and age-based cleanup. The service
//! is cheap to clone; all state lives behind `Arc`s.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use domain::{
    EngineError, MovieCatalog, Page, RecommendationRequest, SortBy, SortDir, UserId,
};

use crate::cache::RecommendationCache;
use crate::registry::StrategyRegistry;
use crate::response::{assemble_page, assemble_views, RecommendationStats, RecommendationView};
use crate::store::RecommendationStore;

/// Pause between users in a batch run, so a big batch cannot starve
/// interactive requests.
const BATCH_DELAY: Duration = Duration::from_millis(100);

/// Orchestrates strategies, storage, and caching behind one API.
#[derive(Clone)]
pub struct RecommendationService {
    registry: Arc<StrategyRegistry>,
    catalog: Arc<dyn MovieCatalog>,
    store: Arc<RecommendationStore>,
    cache: Arc<RecommendationCache>,
}

impl RecommendationService {
    pub fn new(registry: Arc<StrategyRegistry>, catalog: Arc<dyn MovieCatalog>) -> Self {
        Self {
            registry,
            catalog,
            store: Arc::new(RecommendationStore::new()),
            cache: Arc::new(RecommendationCache::new()),
        }
    }

    /// Construct with externally owned store/cache, for tests that need to
    /// tune capacity or TTL.
    pub fn with_components(
        registry: Arc<StrategyRegistry>,
        catalog: Arc<dyn MovieCatalog>,
        store: Arc<RecommendationStore>,
        cache: Arc<RecommendationCache>,
    ) -> Self {
        Self {
            registry,
            catalog,
            store,
            cache,
        }
    }

    /// Generate a fresh set for the user and persist it, replacing whatever
    /// was stored before. Returns the new set, best first.
    #[instrument(skip(self, request), fields(user_id = %request.user_id, algorithm = %request.algorithm))]
    pub async fn generate(
        &self,
        request: RecommendationRequest,
    ) -> Result<Vec<RecommendationView>, EngineError> {
        request.validate()?;
        let strategy = self.registry.select(&request).await?;

        let recommendations = strategy.generate(&request).await;
        info!(
            strategy = strategy.name(),
            count = recommendations.len(),
            "generated recommendation set"
        );

        self.store
            .replace_for_user(&request.user_id, recommendations.clone())
            .await;
        self.cache.invalidate(&request.user_id).await;
        self.cache
            .insert(&request.user_id, recommendations.clone())
            .await;

        Ok(assemble_views(self.catalog.as_ref(), recommendations).await)
    }

    /// One page of the user's stored set. Reads through the cache: a miss
    /// falls back to the store and repopulates the cache.
    pub async fn user_recommendations(
        &self,
        user_id: &str,
        page: usize,
        page_size: usize,
        sort_by: SortBy,
        sort_dir: SortDir,
    ) -> Result<Page<RecommendationView>, EngineError> {
        if page_size == 0 {
            return Err(EngineError::InvalidRequest(
                "page size must be positive".to_string(),
            ));
        }

        let records = match self.cache.get(user_id).await {
            Some(records) => records,
            None => {
                let records = self.store.for_user(user_id).await;
                self.cache.insert(user_id, records.clone()).await;
                records
            }
        };
        if records.is_empty() {
            return Ok(Page::empty(page, page_size));
        }

        let page = RecommendationStore::paginate(records, page, page_size, sort_by, sort_dir);
        Ok(assemble_page(self.catalog.as_ref(), page).await)
    }

    /// The user's stored records produced by one specific algorithm.
    pub async fn user_recommendations_by_algorithm(
        &self,
        user_id: &str,
        algorithm: &str,
    ) -> Result<Vec<RecommendationView>, EngineError> {
        // Reject typos instead of silently returning nothing.
        self.registry.get(algorithm)?;

        let records: Vec<_> = self
            .store
            .for_user(user_id)
            .await
            .into_iter()
            .filter(|rec| rec.algorithm == algorithm)
            .collect();
        Ok(assemble_views(self.catalog.as_ref(), records).await)
    }

    /// Drop the user's current set and regenerate with the given algorithm
    /// and limit. Readers never observe the pre-refresh set after this
    /// returns; the replacement is a single atomic swap inside `generate`.
    pub async fn refresh(
        &self,
        user_id: &str,
        algorithm: &str,
        limit: usize,
    ) -> Result<Vec<RecommendationView>, EngineError> {
        debug!(user_id, algorithm, limit, "refreshing recommendations");
        let request = RecommendationRequest::new(user_id)
            .with_algorithm(algorithm)
            .with_limit(limit);
        self.generate(request).await
    }

    /// Record that the user clicked a recommended movie.
    pub async fn mark_clicked(&self, user_id: &str, movie_id: &str) -> Result<(), EngineError> {
        self.store.set_clicked(user_id, movie_id).await?;
        self.cache.invalidate(user_id).await;
        Ok(())
    }

    /// Record that the user watched a recommended movie.
    pub async fn mark_watched(&self, user_id: &str, movie_id: &str) -> Result<(), EngineError> {
        self.store.set_watched(user_id, movie_id).await?;
        self.cache.invalidate(user_id).await;
        Ok(())
    }

    /// Map a raw interaction event onto the stored record. Fire-and-forget:
    /// unknown actions and missing records are logged, never surfaced, so an
    /// event pipeline hiccup cannot fail the caller.
    pub async fn track_interaction(&self, user_id: &str, movie_id: &str, action: &str) {
        let result = match action {
            "view" | "click" => self.mark_clicked(user_id, movie_id).await,
            "watch" | "watched" => self.mark_watched(user_id, movie_id).await,
            "rate" | "like" | "share" | "watchlist_add" | "watchlist_remove" => {
                debug!(user_id, movie_id, action, "interaction recorded without flag change");
                Ok(())
            }
            other => {
                warn!(user_id, movie_id, action = other, "ignoring unknown interaction action");
                Ok(())
            }
        };
        if let Err(err) = result {
            debug!(user_id, movie_id, action, error = %err, "interaction did not match a stored recommendation");
        }
    }

    /// Kick off background generation for a list of users, all targeting the
    /// given algorithm; individual failures are counted, not fatal. The
    /// returned job can be cancelled or awaited.
    pub fn batch_generate(&self, user_ids: Vec<UserId>, algorithm: &str) -> BatchJob {
        let service = self.clone();
        let algorithm = algorithm.to_string();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle: JoinHandle<BatchSummary> = tokio::spawn(async move {
            let mut summary = BatchSummary::default();
            info!(users = user_ids.len(), algorithm, "starting batch generation");

            for user_id in user_ids {
                if shutdown_rx.try_recv().is_ok() {
                    summary.cancelled = true;
                    break;
                }

                let request = RecommendationRequest::new(user_id.clone())
                    .with_algorithm(algorithm.clone());
                match service.generate(request).await {
                    Ok(_) => summary.processed += 1,
                    Err(err) => {
                        warn!(user_id = %user_id, error = %err, "batch generation failed for user");
                        summary.failed += 1;
                    }
                }

                // Pacing pause doubles as a cancellation point.
                tokio::select! {
                    _ = tokio::time::sleep(BATCH_DELAY) => {}
                    _ = shutdown_rx.recv() => {
                        summary.cancelled = true;
                        break;
                    }
                }
            }

            info!(
                processed = summary.processed,
                failed = summary.failed,
                cancelled = summary.cancelled,
                "batch generation finished"
            );
            summary
        });

        BatchJob {
            handle,
            shutdown: shutdown_tx,
        }
    }

    /// Delete records older than `days_old` days. The cutoff is computed once
    /// so a slow sweep cannot shift its own boundary.
    pub async fn cleanup(&self, days_old: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days_old);
        let removed = self.store.delete_older_than(cutoff).await;
        if removed > 0 {
            // Cached sets may now contain deleted records.
            self.cache.clear().await;
        }
        info!(days_old, removed, "cleanup sweep complete");
        removed
    }

    /// Interaction statistics over the user's stored set.
    pub async fn recommendation_stats(&self, user_id: &str) -> RecommendationStats {
        let records = self.store.for_user(user_id).await;
        RecommendationStats::from_records(&records)
    }
}

/// Handle to a running batch generation task.
pub struct BatchJob {
    handle: JoinHandle<BatchSummary>,
    shutdown: mpsc::Sender<()>,
}

impl BatchJob {
    /// Request cancellation. The task stops at its next cancellation point.
    pub async fn cancel(&self) {
        let _ = self.shutdown.send(()).await;
    }

    /// Wait for the task to finish and collect its summary.
    pub async fn wait(self) -> BatchSummary {
        self.handle.await.unwrap_or_default()
    }
}

/// Outcome counts for a batch generation run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub cancelled: bool,
}
