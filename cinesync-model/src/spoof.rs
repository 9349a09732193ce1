use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inferred video quality, derived from the destination path (§4.5 key
/// derivations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "4K-2160p")]
    Uhd2160p,
    #[serde(rename = "HD-1080p")]
    Hd1080p,
    #[serde(rename = "HD-720p")]
    Hd720p,
    Unknown,
}

impl Quality {
    pub const fn as_str(self) -> &'static str {
        match self {
            Quality::Uhd2160p => "4K-2160p",
            Quality::Hd1080p => "HD-1080p",
            Quality::Hd720p => "HD-720p",
            Quality::Unknown => "Unknown",
        }
    }
}

/// Infer quality from a destination path per §4.5: `2160p`/`4k` -> 4K,
/// `1080p` -> HD-1080p, `720p` -> HD-720p, else Unknown.
pub fn infer_quality(destination_path: &str) -> Quality {
    let lower = destination_path.to_lowercase();
    if lower.contains("2160p") || lower.contains("4k") {
        Quality::Uhd2160p
    } else if lower.contains("1080p") {
        Quality::Hd1080p
    } else if lower.contains("720p") {
        Quality::Hd720p
    } else {
        Quality::Unknown
    }
}

/// A spoofed Radarr-shaped movie record (§4.5). `id` is the stable
/// enumeration id assigned by the caller at query time, not stored here.
/// `camelCase` on the wire matches the real Radarr API clients expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub tmdb_id: Option<i64>,
    pub has_file: bool,
    pub movie_file: Option<MovieFileRecord>,
    pub root_folder_path: String,
    pub added: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFileRecord {
    pub id: i64,
    pub size: i64,
    pub quality: String,
    pub relative_path: String,
}

/// A spoofed Sonarr-shaped series record (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    pub id: i64,
    pub title: String,
    pub tmdb_id: Option<i64>,
    pub root_folder_path: String,
    pub added: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeRecord {
    pub id: i64,
    pub series_id: i64,
    pub season_number: i64,
    pub episode_number: i64,
    pub has_file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeFileRecord {
    pub id: i64,
    pub episode_id: i64,
    pub size: i64,
    pub quality: String,
    pub relative_path: String,
}

/// Deterministic episode id: `series_id*10000 + season*100 + episode`
/// (§4.5). Injective for any `series_id` as long as `season < 100` and
/// `episode < 100` (§8 invariant). The episode-file id equals the episode
/// id.
pub fn episode_id(series_id: i64, season_number: i64, episode_number: i64) -> i64 {
    series_id * 10_000 + season_number * 100 + episode_number
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_inference() {
        assert_eq!(infer_quality("/out/Movie (2020)/movie.2160p.mkv"), Quality::Uhd2160p);
        assert_eq!(infer_quality("/out/Movie (2020)/movie.4K.mkv"), Quality::Uhd2160p);
        assert_eq!(infer_quality("/out/movie.1080p.mkv"), Quality::Hd1080p);
        assert_eq!(infer_quality("/out/movie.720p.mkv"), Quality::Hd720p);
        assert_eq!(infer_quality("/out/movie.mkv"), Quality::Unknown);
    }

    #[test]
    fn episode_id_is_injective_within_bounds() {
        let mut seen = std::collections::HashSet::new();
        for series_id in 1..5 {
            for season in 0..100 {
                for episode in 0..100 {
                    assert!(seen.insert(episode_id(series_id, season, episode)));
                }
            }
        }
    }

    #[test]
    fn episode_file_id_equals_episode_id() {
        assert_eq!(episode_id(7, 2, 5), 70205);
    }
}
