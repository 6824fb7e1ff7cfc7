//! Response assembly: enrich stored recommendation records with catalog
//! metadata before they leave the engine.

use std::collections::HashMap;

use serde::Serialize;

use domain::{MovieCatalog, Page, Recommendation};
use strategies::bounded;

/// A recommendation as presented to callers, with catalog metadata attached.
/// Metadata fields stay empty when the catalog cannot resolve the movie; the
/// recommendation itself is still returned.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationView {
    pub user_id: String,
    pub movie_id: String,
    pub title: Option<String>,
    pub genres: Vec<String>,
    pub year: Option<u16>,
    pub score: f64,
    pub algorithm: String,
    pub reason: String,
    pub recommended_at: chrono::DateTime<chrono::Utc>,
    pub clicked: bool,
    pub watched: bool,
}

/// Aggregate interaction statistics over a user's stored set.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationStats {
    pub total: usize,
    pub clicked: usize,
    pub watched: usize,
    pub click_through_rate: f64,
    pub watch_rate: f64,
    pub avg_score: f64,
    pub by_algorithm: HashMap<String, usize>,
}

impl RecommendationStats {
    pub fn from_records(records: &[Recommendation]) -> Self {
        let total = records.len();
        let clicked = records.iter().filter(|r| r.clicked).count();
        let watched = records.iter().filter(|r| r.watched).count();
        let mut by_algorithm: HashMap<String, usize> = HashMap::new();
        for record in records {
            *by_algorithm.entry(record.algorithm.clone()).or_insert(0) += 1;
        }
        let rate = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };
        let avg_score = if total == 0 {
            0.0
        } else {
            records.iter().map(|r| r.score).sum::<f64>() / total as f64
        };

        Self {
            total,
            clicked,
            watched,
            click_through_rate: rate(clicked),
            watch_rate: rate(watched),
            avg_score,
            by_algorithm,
        }
    }
}

/// Attach movie metadata to each record, preserving order.
pub async fn assemble_views<C: MovieCatalog + ?Sized>(
    catalog: &C,
    records: Vec<Recommendation>,
) -> Vec<RecommendationView> {
    let mut views = Vec::with_capacity(records.len());
    for record in records {
        // Same timeout discipline as the strategies: a hung catalog cannot
        // stall assembly, it just loses the metadata.
        let movie = bounded(catalog.movie(&record.movie_id)).await.ok().flatten();
        let (title, genres, year) = match movie {
            Some(movie) => (Some(movie.title), movie.genres, movie.year),
            None => (None, Vec::new(), None),
        };
        views.push(RecommendationView {
            user_id: record.user_id,
            movie_id: record.movie_id,
            title,
            genres,
            year,
            score: record.score,
            algorithm: record.algorithm,
            reason: record.reason,
            recommended_at: record.recommended_at,
            clicked: record.clicked,
            watched: record.watched,
        });
    }
    views
}

/// Page-wise variant of [`assemble_views`].
pub async fn assemble_page<C: MovieCatalog + ?Sized>(
    catalog: &C,
    page: Page<Recommendation>,
) -> Page<RecommendationView> {
    let items = assemble_views(catalog, page.items).await;
    Page {
        items,
        page: page.page,
        page_size: page.page_size,
        total: page.total,
    }
}
