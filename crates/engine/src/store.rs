//! Persisted recommendation sets, one per user.
//!
//! Generation always replaces a user's entire set atomically: readers see
//! either the old set or the new one, never a mix. Interaction flags mutate
//! records in place; an age-based sweep removes stale sets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use domain::{EngineError, Page, Recommendation, SortBy, SortDir, UserId};

/// In-memory store of the latest generated set per user.
#[derive(Default)]
pub struct RecommendationStore {
    sets: RwLock<HashMap<UserId, Vec<Recommendation>>>,
}

impl RecommendationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the user's whole set.
    pub async fn replace_for_user(&self, user_id: &str, recommendations: Vec<Recommendation>) {
        let mut sets = self.sets.write().await;
        sets.insert(user_id.to_string(), recommendations);
    }

    /// The user's current set, unsorted. Empty when nothing was generated.
    pub async fn for_user(&self, user_id: &str) -> Vec<Recommendation> {
        self.sets
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Sort and slice one page out of a recommendation set.
    pub fn paginate(
        mut recommendations: Vec<Recommendation>,
        page: usize,
        page_size: usize,
        sort_by: SortBy,
        sort_dir: SortDir,
    ) -> Page<Recommendation> {
        recommendations.sort_by(|a, b| {
            let ordering = match sort_by {
                SortBy::Score => a
                    .score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal),
                SortBy::RecommendedAt => a.recommended_at.cmp(&b.recommended_at),
            };
            match sort_dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        let total = recommendations.len();
        let start = page.saturating_mul(page_size);
        let items: Vec<Recommendation> = recommendations
            .into_iter()
            .skip(start)
            .take(page_size)
            .collect();

        Page {
            items,
            page,
            page_size,
            total,
        }
    }

    /// Flip the clicked flag on one stored record.
    pub async fn set_clicked(&self, user_id: &str, movie_id: &str) -> Result<(), EngineError> {
        self.update_record(user_id, movie_id, |rec| rec.clicked = true)
            .await
    }

    /// Flip the watched flag on one stored record.
    pub async fn set_watched(&self, user_id: &str, movie_id: &str) -> Result<(), EngineError> {
        self.update_record(user_id, movie_id, |rec| rec.watched = true)
            .await
    }

    async fn update_record(
        &self,
        user_id: &str,
        movie_id: &str,
        apply: impl FnOnce(&mut Recommendation),
    ) -> Result<(), EngineError> {
        let mut sets = self.sets.write().await;
        let record = sets
            .get_mut(user_id)
            .and_then(|set| set.iter_mut().find(|rec| rec.movie_id == movie_id))
            .ok_or_else(|| EngineError::RecommendationNotFound {
                user_id: user_id.to_string(),
                movie_id: movie_id.to_string(),
            })?;
        apply(record);
        Ok(())
    }

    /// Remove every record generated strictly before `cutoff`. Users whose
    /// sets empty out are dropped entirely. Returns the number of removed
    /// records.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut sets = self.sets.write().await;
        let mut removed = 0;
        sets.retain(|_, set| {
            let before = set.len();
            set.retain(|rec| rec.recommended_at >= cutoff);
            removed += before - set.len();
            !set.is_empty()
        });
        debug!(removed, "cleaned up stale recommendations");
        removed
    }

    /// Total records across all users.
    pub async fn len(&self) -> usize {
        self.sets.read().await.values().map(|set| set.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rec(user: &str, movie: &str, score: f64) -> Recommendation {
        Recommendation::new(user, movie, score, "popular", "test")
    }

    #[tokio::test]
    async fn test_replace_is_total() {
        let store = RecommendationStore::new();
        store
            .replace_for_user("u1", vec![rec("u1", "m1", 1.0), rec("u1", "m2", 2.0)])
            .await;
        store.replace_for_user("u1", vec![rec("u1", "m3", 3.0)]).await;

        let set = store.for_user("u1").await;
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].movie_id, "m3");
    }

    #[tokio::test]
    async fn test_flag_updates() {
        let store = RecommendationStore::new();
        store.replace_for_user("u1", vec![rec("u1", "m1", 1.0)]).await;

        store.set_clicked("u1", "m1").await.unwrap();
        store.set_watched("u1", "m1").await.unwrap();

        let set = store.for_user("u1").await;
        assert!(set[0].clicked);
        assert!(set[0].watched);

        let missing = store.set_clicked("u1", "m9").await;
        assert!(matches!(
            missing,
            Err(EngineError::RecommendationNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_pagination_sorting() {
        let recs = vec![
            rec("u1", "m1", 0.2),
            rec("u1", "m2", 0.9),
            rec("u1", "m3", 0.5),
        ];

        let page =
            RecommendationStore::paginate(recs.clone(), 0, 2, SortBy::Score, SortDir::Desc);
        assert_eq!(page.total, 3);
        assert_eq!(page.items[0].movie_id, "m2");
        assert_eq!(page.items[1].movie_id, "m3");

        let second =
            RecommendationStore::paginate(recs, 1, 2, SortBy::Score, SortDir::Desc);
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].movie_id, "m1");
    }

    #[tokio::test]
    async fn test_cleanup_honors_cutoff() {
        let store = RecommendationStore::new();
        let mut old = rec("u1", "m1", 1.0);
        old.recommended_at = Utc::now() - Duration::days(31);
        let fresh = rec("u1", "m2", 1.0);
        store.replace_for_user("u1", vec![old, fresh]).await;

        let mut recent = rec("u2", "m1", 1.0);
        recent.recommended_at = Utc::now() - Duration::days(29);
        store.replace_for_user("u2", vec![recent]).await;

        let removed = store.delete_older_than(Utc::now() - Duration::days(30)).await;
        assert_eq!(removed, 1);
        assert_eq!(store.for_user("u1").await.len(), 1);
        assert_eq!(store.for_user("u2").await.len(), 1);
    }
}
