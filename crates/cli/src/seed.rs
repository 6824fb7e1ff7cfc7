//! Deterministic demo dataset: a small catalog plus simulated viewers whose
//! ratings follow per-user genre affinities, so every strategy has signal to
//! work with.

use domain::{MemoryDataset, Movie};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIMULATED_VIEWERS: usize = 150;

struct SeedMovie {
    id: &'static str,
    title: &'static str,
    genres: &'static [&'static str],
    director: Option<&'static str>,
    year: u16,
}

const CATALOG: &[SeedMovie] = &[
    SeedMovie { id: "tt001", title: "Midnight Heist", genres: &["Action", "Thriller"], director: Some("Rivera"), year: 1998 },
    SeedMovie { id: "tt002", title: "Steel Horizon", genres: &["Action", "Sci-Fi"], director: Some("Rivera"), year: 2003 },
    SeedMovie { id: "tt003", title: "Last Checkpoint", genres: &["Action"], director: Some("Okafor"), year: 2008 },
    SeedMovie { id: "tt004", title: "Falling Petals", genres: &["Drama", "Romance"], director: Some("Sato"), year: 1995 },
    SeedMovie { id: "tt005", title: "The Long Winter", genres: &["Drama"], director: Some("Sato"), year: 2001 },
    SeedMovie { id: "tt006", title: "Paper Bridges", genres: &["Drama"], director: Some("Lindqvist"), year: 2010 },
    SeedMovie { id: "tt007", title: "Orbital Decay", genres: &["Sci-Fi", "Thriller"], director: Some("Okafor"), year: 2014 },
    SeedMovie { id: "tt008", title: "Signal Lost", genres: &["Sci-Fi"], director: Some("Okafor"), year: 2017 },
    SeedMovie { id: "tt009", title: "Quantum Alley", genres: &["Sci-Fi", "Mystery"], director: None, year: 2019 },
    SeedMovie { id: "tt010", title: "Laughing Matter", genres: &["Comedy"], director: Some("Beaumont"), year: 1999 },
    SeedMovie { id: "tt011", title: "Spare Parts", genres: &["Comedy"], director: Some("Beaumont"), year: 2005 },
    SeedMovie { id: "tt012", title: "Double Booked", genres: &["Comedy", "Romance"], director: None, year: 2012 },
    SeedMovie { id: "tt013", title: "Harbor Lights", genres: &["Romance", "Drama"], director: Some("Sato"), year: 2007 },
    SeedMovie { id: "tt014", title: "The Cartographer", genres: &["Mystery", "Thriller"], director: Some("Lindqvist"), year: 2002 },
    SeedMovie { id: "tt015", title: "Cold Ledger", genres: &["Mystery"], director: Some("Lindqvist"), year: 2016 },
    SeedMovie { id: "tt016", title: "Kingdom of Dust", genres: &["Adventure", "Action"], director: Some("Rivera"), year: 2011 },
    SeedMovie { id: "tt017", title: "River and Stone", genres: &["Adventure"], director: None, year: 2006 },
    SeedMovie { id: "tt018", title: "The Gilded Cage", genres: &["Drama", "Mystery"], director: Some("Sato"), year: 2018 },
    SeedMovie { id: "tt019", title: "Overclock", genres: &["Sci-Fi", "Action"], director: Some("Okafor"), year: 2021 },
    SeedMovie { id: "tt020", title: "Punchline City", genres: &["Comedy", "Crime"], director: Some("Beaumont"), year: 2015 },
    SeedMovie { id: "tt021", title: "Ashes of Autumn", genres: &["Drama", "Romance"], director: Some("Lindqvist"), year: 2020 },
    SeedMovie { id: "tt022", title: "Night Ferry", genres: &["Thriller", "Crime"], director: Some("Rivera"), year: 2013 },
    SeedMovie { id: "tt023", title: "Glass Mountain", genres: &["Adventure", "Drama"], director: None, year: 2009 },
    SeedMovie { id: "tt024", title: "Final Transmission", genres: &["Sci-Fi", "Thriller"], director: Some("Okafor"), year: 2023 },
];

const GENRES: &[&str] = &[
    "Action", "Drama", "Sci-Fi", "Comedy", "Romance", "Mystery", "Thriller", "Adventure", "Crime",
];

/// Build the demo dataset. The same seed always produces the same ratings.
pub fn seed_dataset(seed: u64) -> MemoryDataset {
    let mut data = MemoryDataset::new();
    for entry in CATALOG {
        data.insert_movie(Movie {
            id: entry.id.to_string(),
            title: entry.title.to_string(),
            genres: entry.genres.iter().map(|g| g.to_string()).collect(),
            director: entry.director.map(|d| d.to_string()),
            actors: vec![],
            year: Some(entry.year),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    for viewer in 0..SIMULATED_VIEWERS {
        let user_id = format!("user{viewer}");

        // Two favorite genres per viewer drive their rating pattern.
        let favorite_a = GENRES[rng.random_range(0..GENRES.len())];
        let favorite_b = GENRES[rng.random_range(0..GENRES.len())];

        let rated = rng.random_range(8..=16);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..rated {
            let movie = &CATALOG[rng.random_range(0..CATALOG.len())];
            if !seen.insert(movie.id) {
                continue;
            }
            let affinity = movie.genres.contains(&favorite_a) || movie.genres.contains(&favorite_b);
            let base = if affinity { 4.2 } else { 2.8 };
            let noise: f64 = rng.random_range(-0.8..=0.8);
            let value = (base + noise).clamp(0.5, 5.0);
            // Half-star steps, like real rating widgets.
            let value = (value * 2.0).round() / 2.0;
            data.rate(&user_id, movie.id, value);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeding_is_deterministic() {
        let (movies_a, users_a, ratings_a) = seed_dataset(7).counts();
        let (movies_b, users_b, ratings_b) = seed_dataset(7).counts();
        assert_eq!(movies_a, movies_b);
        assert_eq!(users_a, users_b);
        assert_eq!(ratings_a, ratings_b);
        assert_eq!(movies_a, CATALOG.len());
        assert_eq!(users_a, SIMULATED_VIEWERS);
    }
}
