use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use domain::{MemoryDataset, MovieCatalog, RatingStore, RecommendationRequest, SortBy, SortDir};
use engine::{RecommendationService, RecommendationView, RegistryConfig, StrategyRegistry};
use std::sync::Arc;
use std::time::Instant;

mod seed;

/// CineRec - Movie Recommendation Engine
#[derive(Parser)]
#[command(name = "cinerec")]
#[command(about = "Movie recommendation engine with pluggable scoring strategies", long_about = None)]
struct Cli {
    /// Seed for the simulated demo dataset
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Disable ranking jitter for reproducible output
    #[arg(long)]
    no_jitter: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get movie recommendations for a user
    Recommend {
        /// User ID to get recommendations for (user0 .. user149)
        #[arg(long)]
        user_id: String,

        /// Scoring algorithm to use
        #[arg(long, default_value = "hybrid")]
        algorithm: String,

        /// Number of recommendations to return
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only recommend movies in this genre
        #[arg(long)]
        genre: Option<String>,

        /// Only recommend movies released in or after this year
        #[arg(long)]
        from_year: Option<u16>,
    },

    /// Show a user's rating history
    User {
        /// User ID to display
        #[arg(long)]
        user_id: String,
    },

    /// List the registered scoring algorithms
    Algorithms,

    /// Walk through a full workflow: generate, interact, refresh, stats
    Demo {
        /// User ID to run the workflow for
        #[arg(long, default_value = "user0")]
        user_id: String,
    },

    /// Run concurrent generation requests and report latencies
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let start = Instant::now();
    let dataset = Arc::new(seed::seed_dataset(cli.seed));
    let (movies, users, ratings) = dataset.counts();
    println!(
        "{} Seeded demo dataset: {} movies, {} viewers, {} ratings ({:?})",
        "✓".green(),
        movies,
        users,
        ratings,
        start.elapsed()
    );

    let config = RegistryConfig {
        jitter_amplitude: if cli.no_jitter { 0.0 } else { 0.05 },
        jitter_seed: None,
    };
    let registry = Arc::new(StrategyRegistry::with_config(
        dataset.clone(),
        dataset.clone(),
        dataset.clone(),
        config,
    ));
    let service = RecommendationService::new(registry.clone(), dataset.clone());

    match cli.command {
        Commands::Recommend {
            user_id,
            algorithm,
            limit,
            genre,
            from_year,
        } => handle_recommend(&service, user_id, algorithm, limit, genre, from_year).await?,
        Commands::User { user_id } => handle_user(&dataset, user_id).await?,
        Commands::Algorithms => handle_algorithms(&registry),
        Commands::Demo { user_id } => handle_demo(&service, user_id).await?,
        Commands::Benchmark { requests } => handle_benchmark(&service, requests).await?,
    }

    Ok(())
}

/// Handle the 'recommend' command
async fn handle_recommend(
    service: &RecommendationService,
    user_id: String,
    algorithm: String,
    limit: usize,
    genre: Option<String>,
    from_year: Option<u16>,
) -> Result<()> {
    let mut request = RecommendationRequest::new(user_id)
        .with_algorithm(algorithm)
        .with_limit(limit);
    if let Some(genre) = genre {
        request = request.with_genre(vec![genre]);
    }
    if from_year.is_some() {
        request = request.with_year_range(from_year, None);
    }

    let views = service.generate(request).await.map_err(|err| anyhow!(err))?;
    print_recommendations(&views);
    Ok(())
}

/// Handle the 'user' command
async fn handle_user(dataset: &Arc<MemoryDataset>, user_id: String) -> Result<()> {
    let history = dataset
        .ratings_for_user(&user_id)
        .await
        .map_err(|err| anyhow!(err))?;
    if history.is_empty() {
        return Err(anyhow!("User {} has no ratings", user_id));
    }

    println!("{}", format!("User: {user_id}").bold().blue());
    let avg: f64 = history.iter().map(|r| r.value).sum::<f64>() / history.len() as f64;
    println!("{}Ratings: {}", "• ".cyan(), history.len());
    println!("{}Average rating: {:.2}", "• ".cyan(), avg);

    let mut top = history.clone();
    top.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    println!("Top rated:");
    for rating in top.iter().take(5) {
        let title = dataset
            .movie(&rating.movie_id)
            .await
            .ok()
            .flatten()
            .map(|m| m.title)
            .unwrap_or_else(|| rating.movie_id.clone());
        println!("  - {} ({:.1}/5)", title, rating.value);
    }
    Ok(())
}

/// Handle the 'algorithms' command
fn handle_algorithms(registry: &Arc<StrategyRegistry>) {
    println!("{}", "Registered algorithms:".bold().blue());
    for name in registry.names() {
        println!("  - {name}");
    }
}

/// Handle the 'demo' command: exercise the full service surface once.
async fn handle_demo(service: &RecommendationService, user_id: String) -> Result<()> {
    println!("{}", "1. Generating hybrid recommendations".bold());
    let views = service
        .generate(RecommendationRequest::new(user_id.clone()).with_limit(5))
        .await
        .map_err(|err| anyhow!(err))?;
    print_recommendations(&views);
    let Some(first) = views.first() else {
        return Err(anyhow!("No recommendations produced for {}", user_id));
    };

    println!("{}", "2. Simulating interactions on the top pick".bold());
    service.track_interaction(&user_id, &first.movie_id, "click").await;
    service.track_interaction(&user_id, &first.movie_id, "watch").await;

    println!("{}", "3. Reading back a sorted page".bold());
    let page = service
        .user_recommendations(&user_id, 0, 3, SortBy::Score, SortDir::Desc)
        .await
        .map_err(|err| anyhow!(err))?;
    println!("   page 0: {} of {} records", page.items.len(), page.total);

    println!("{}", "4. Interaction statistics".bold());
    let stats = service.recommendation_stats(&user_id).await;
    println!(
        "   total {} | clicked {} | watched {} | CTR {:.0}%",
        stats.total,
        stats.clicked,
        stats.watched,
        stats.click_through_rate * 100.0
    );

    println!("{}", "5. Refreshing the set".bold());
    let refreshed = service
        .refresh(&user_id, "hybrid", 5)
        .await
        .map_err(|err| anyhow!(err))?;
    println!("   refreshed: {} records", refreshed.len());

    println!("{}", "6. Cleanup sweep (30 days)".bold());
    let removed = service.cleanup(30).await;
    println!("   removed {removed} stale records");
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(service: &RecommendationService, requests: usize) -> Result<()> {
    if requests == 0 {
        return Err(anyhow!("--requests must be at least 1"));
    }

    let mut handles = vec![];
    for i in 0..requests {
        let service = service.clone();
        let user_id = format!("user{}", i % 150);
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            service
                .generate(RecommendationRequest::new(user_id))
                .await
                .map_err(|err| anyhow!(err))?;
            Ok::<_, anyhow::Error>(start.elapsed())
        });
        handles.push(handle);
    }

    let mut timings = vec![];
    let wall = Instant::now();
    for handle in handles {
        timings.push(handle.await??);
    }
    let wall = wall.elapsed();

    timings.sort();
    let total: std::time::Duration = timings.iter().sum();
    let avg = total / (timings.len() as u32);
    let p50 = timings[timings.len() / 2];
    let p95 = timings[((timings.len() as f32 * 0.95) as usize).min(timings.len() - 1)];
    let p99 = timings[((timings.len() as f32 * 0.99) as usize).min(timings.len() - 1)];

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {requests}");
    println!("Wall time: {wall:?}");
    println!("Average latency: {avg:?}");
    println!("P50 latency: {p50:?}");
    println!("P95 latency: {p95:?}");
    println!("P99 latency: {p99:?}");
    println!(
        "Throughput: {:.2} requests/second",
        requests as f64 / wall.as_secs_f64()
    );
    Ok(())
}

/// Helper function to format and print recommendations
fn print_recommendations(views: &[RecommendationView]) {
    println!("{}", "Recommendations:".bold().blue());
    for (rank, view) in views.iter().enumerate() {
        let title = view.title.as_deref().unwrap_or(&view.movie_id);
        let genres = view.genres.join(", ");
        println!(
            "{}. {} ({}) [{}] - {} {:.3}",
            (rank + 1).to_string().green(),
            title,
            view.year
                .map(|y| y.to_string())
                .unwrap_or_else(|| "?".to_string()),
            genres,
            view.algorithm.dimmed(),
            view.score
        );
        println!("   {}", view.reason.dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_benchmark_rejects_zero_requests() {
        let dataset = Arc::new(seed::seed_dataset(1));
        let registry = Arc::new(StrategyRegistry::with_config(
            dataset.clone(),
            dataset.clone(),
            dataset.clone(),
            RegistryConfig {
                jitter_amplitude: 0.0,
                jitter_seed: None,
            },
        ));
        let service = RecommendationService::new(registry, dataset);

        assert!(handle_benchmark(&service, 0).await.is_err());
    }
}
