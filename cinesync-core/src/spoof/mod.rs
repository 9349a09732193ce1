//! Protocol-spoof read model (§4.5): shapes DB-MAIN `processed_files` rows
//! into Radarr/Sonarr-compatible response records, computed on demand with
//! no materialized spoof tables. Enumeration order from the SQL query
//! result assigns the stable integer ids (§4.5 Ordering and stability).

use std::collections::BTreeMap;

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::Row;

use cinesync_model::folder_mapping::FolderMapping;
use cinesync_model::spoof::{
    episode_id, infer_quality, EpisodeFileRecord, EpisodeRecord, MovieFileRecord, MovieRecord, SeriesRecord,
};

use crate::error::{Error, Result};
use crate::storage::DbHandle;

static EPISODE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)S(\d+)E(\d+)").unwrap());

pub struct SpoofReadModel {
    main_db: DbHandle,
    aux_db: DbHandle,
}

struct GroupKey {
    proper_name: String,
    year: Option<i64>,
    tmdb_id: Option<String>,
}

impl SpoofReadModel {
    pub fn new(main_db: DbHandle, aux_db: DbHandle) -> Self {
        SpoofReadModel { main_db, aux_db }
    }

    /// List movie records, optionally scoped to a folder mapping's prefix
    /// (§4.5 Folder mode).
    pub async fn list_movies(&self, scope: Option<&FolderMapping>) -> Result<Vec<MovieRecord>> {
        let rows = self.fetch_movie_groups(scope).await?;
        let mut movies = Vec::with_capacity(rows.len());
        for (enumeration_id, (key, destination_path, size, processed_at)) in rows.into_iter().enumerate() {
            let id = enumeration_id as i64 + 1;
            let quality = destination_path.as_deref().map(infer_quality);
            let movie_file = destination_path.as_ref().map(|dest| MovieFileRecord {
                id,
                size: size.unwrap_or(0),
                quality: quality.unwrap_or(cinesync_model::spoof::Quality::Unknown).as_str().to_string(),
                relative_path: dest.clone(),
            });
            movies.push(MovieRecord {
                id,
                title: key.proper_name.clone(),
                year: key.year.map(|y| y as i32),
                tmdb_id: key.tmdb_id.as_deref().and_then(|s| s.parse().ok()),
                has_file: movie_file.is_some(),
                movie_file,
                root_folder_path: "/movies".to_string(),
                added: processed_at,
            });
        }
        Ok(movies)
    }

    /// List series records with their episodes/episode-files grouped by
    /// season/episode extracted via `S(\d+)E(\d+)` (§4.5).
    pub async fn list_series(&self, scope: Option<&FolderMapping>) -> Result<Vec<(SeriesRecord, Vec<EpisodeRecord>, Vec<EpisodeFileRecord>)>> {
        let rows = self.fetch_series_groups(scope).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (enumeration_id, (key, processed_at)) in rows.into_iter().enumerate() {
            let series_id = enumeration_id as i64 + 1;
            let series = SeriesRecord {
                id: series_id,
                title: key.proper_name.clone(),
                tmdb_id: key.tmdb_id.as_deref().and_then(|s| s.parse().ok()),
                root_folder_path: "/tv".to_string(),
                added: processed_at,
            };

            let episode_rows = self.fetch_episode_files_for(&key, scope).await?;
            let mut episodes = Vec::new();
            let mut episode_files = Vec::new();
            for (file_path, destination_path, size) in episode_rows {
                let Some(caps) = EPISODE_PATTERN.captures(&file_path) else {
                    continue;
                };
                let season: i64 = caps.get(1).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let episode: i64 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
                let eid = episode_id(series_id, season, episode);
                episodes.push(EpisodeRecord {
                    id: eid,
                    series_id,
                    season_number: season,
                    episode_number: episode,
                    has_file: destination_path.is_some(),
                });
                if let Some(dest) = destination_path {
                    episode_files.push(EpisodeFileRecord {
                        id: eid,
                        episode_id: eid,
                        size: size.unwrap_or(0),
                        quality: infer_quality(&dest).as_str().to_string(),
                        relative_path: dest,
                    });
                }
            }
            out.push((series, episodes, episode_files));
        }
        Ok(out)
    }

    /// Synthesize `poster`/`fanart` image entries for a tmdb id, joining
    /// DB-AUX `tmdb_entities` (§4.5 Image URLs).
    pub async fn image_urls(&self, tmdb_id: i64, media_type: &str) -> Result<Vec<(String, String)>> {
        let row = sqlx::query("SELECT poster_path FROM tmdb_entities WHERE tmdb_id = ? AND media_type = ?")
            .bind(tmdb_id)
            .bind(media_type)
            .fetch_optional(self.aux_db.read_pool())
            .await?;
        let poster_path: Option<String> = row.and_then(|r| r.get("poster_path"));
        match poster_path {
            Some(path) => Ok(vec![
                ("poster".to_string(), format!("/imagecache/poster{path}")),
                ("fanart".to_string(), format!("/imagecache/fanart{path}")),
            ]),
            None => Ok(vec![
                ("poster".to_string(), "/MediaCover/poster-fallback.jpg".to_string()),
                ("fanart".to_string(), "/MediaCover/fanart-fallback.jpg".to_string()),
            ]),
        }
    }

    /// Best-effort `media_type` lookup for a tmdb id, used by the
    /// `MediaCover` handler which only has `tmdbId` in its path and must
    /// guess whether to query the movie or tv shape (§4.5 Image URLs).
    pub async fn media_type_for(&self, tmdb_id: i64) -> Result<Option<String>> {
        let row = sqlx::query("SELECT media_type FROM tmdb_entities WHERE tmdb_id = ? LIMIT 1")
            .bind(tmdb_id)
            .fetch_optional(self.aux_db.read_pool())
            .await
            .map_err(Error::from)?;
        Ok(row.map(|r| r.get("media_type")))
    }

    async fn fetch_movie_groups(
        &self,
        scope: Option<&FolderMapping>,
    ) -> Result<Vec<(GroupKey, Option<String>, Option<i64>, chrono::DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT proper_name, year, tmdb_id, destination_path, file_size, MAX(processed_at) AS added \
             FROM processed_files WHERE season_number IS NULL GROUP BY proper_name, year, tmdb_id ORDER BY proper_name",
        )
        .fetch_all(self.main_db.read_pool())
        .await
        .map_err(Error::from)?;

        let mut grouped = BTreeMap::new();
        for row in rows {
            let destination_path: Option<String> = row.get("destination_path");
            if let Some(scope) = scope {
                if !destination_path.as_deref().map(|p| scope.contains(p)).unwrap_or(false) {
                    continue;
                }
            }
            let key = GroupKey {
                proper_name: row.get::<Option<String>, _>("proper_name").unwrap_or_default(),
                year: row.get("year"),
                tmdb_id: row.get("tmdb_id"),
            };
            let added_str: Option<String> = row.get("added");
            let added = added_str
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            grouped.insert(
                (key.proper_name.clone(), key.year, key.tmdb_id.clone()),
                (key, destination_path, row.get::<Option<i64>, _>("file_size"), added),
            );
        }
        Ok(grouped.into_values().collect())
    }

    async fn fetch_series_groups(
        &self,
        scope: Option<&FolderMapping>,
    ) -> Result<Vec<(GroupKey, chrono::DateTime<Utc>)>> {
        let rows = sqlx::query(
            "SELECT proper_name, year, tmdb_id, destination_path, MAX(processed_at) AS added \
             FROM processed_files WHERE season_number IS NOT NULL GROUP BY proper_name, year, tmdb_id ORDER BY proper_name",
        )
        .fetch_all(self.main_db.read_pool())
        .await
        .map_err(Error::from)?;

        let mut grouped = BTreeMap::new();
        for row in rows {
            let destination_path: Option<String> = row.get("destination_path");
            if let Some(scope) = scope {
                if !destination_path.as_deref().map(|p| scope.contains(p)).unwrap_or(false) {
                    continue;
                }
            }
            let key = GroupKey {
                proper_name: row.get::<Option<String>, _>("proper_name").unwrap_or_default(),
                year: row.get("year"),
                tmdb_id: row.get("tmdb_id"),
            };
            let added_str: Option<String> = row.get("added");
            let added = added_str
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            grouped.insert((key.proper_name.clone(), key.year, key.tmdb_id.clone()), (key, added));
        }
        Ok(grouped.into_values().collect())
    }

    async fn fetch_episode_files_for(
        &self,
        key: &GroupKey,
        scope: Option<&FolderMapping>,
    ) -> Result<Vec<(String, Option<String>, Option<i64>)>> {
        let rows = sqlx::query(
            "SELECT file_path, destination_path, file_size FROM processed_files WHERE proper_name = ? AND tmdb_id IS ? AND season_number IS NOT NULL",
        )
        .bind(&key.proper_name)
        .bind(&key.tmdb_id)
        .fetch_all(self.main_db.read_pool())
        .await
        .map_err(Error::from)?;

        Ok(rows
            .into_iter()
            .filter(|row| {
                scope
                    .map(|s| {
                        row.get::<Option<String>, _>("destination_path")
                            .map(|p| s.contains(&p))
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .map(|row| (row.get("file_path"), row.get("destination_path"), row.get("file_size")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::HandleConfig;

    async fn setup() -> (tempfile::TempDir, DbHandle, DbHandle) {
        let dir = tempfile::tempdir().unwrap();
        let main = DbHandle::open("main", &dir.path().join("main.db"), HandleConfig::MAIN).await.unwrap();
        let aux = DbHandle::open("aux", &dir.path().join("aux.db"), HandleConfig::AUX).await.unwrap();
        main.write_sync("seed_movie", crate::retry::RetryPolicy::DEFAULT, |conn| async move {
            sqlx::query(
                "INSERT INTO processed_files (file_path, destination_path, tmdb_id, proper_name, year, file_size, processed_at) VALUES ('/src/a.mkv', '/movies/A (2020)/a.2160p.mkv', '603', 'A', 2020, 123, '2026-01-01T00:00:00Z')",
            )
            .execute(&mut *conn)
            .await
            .map(|_| ())
        })
        .await
        .unwrap();
        (dir, main, aux)
    }

    #[tokio::test]
    async fn movie_list_infers_quality_and_stable_id() {
        let (_dir, main, aux) = setup().await;
        let model = SpoofReadModel::new(main, aux);
        let movies = model.list_movies(None).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].id, 1);
        assert!(movies[0].has_file);
        assert_eq!(movies[0].movie_file.as_ref().unwrap().quality, "4K-2160p");
    }

    #[tokio::test]
    async fn image_urls_fall_back_without_cached_poster() {
        let (_dir, main, aux) = setup().await;
        let model = SpoofReadModel::new(main, aux);
        let urls = model.image_urls(603, "movie").await.unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].1.contains("fallback"));
    }

    #[tokio::test]
    async fn series_list_groups_episodes_by_season_and_stays_out_of_movie_list() {
        let (_dir, main, aux) = setup().await;
        main.write_sync("seed_episode", crate::retry::RetryPolicy::DEFAULT, |conn| async move {
            sqlx::query(
                "INSERT INTO processed_files (file_path, destination_path, tmdb_id, proper_name, year, file_size, season_number, processed_at) VALUES ('/src/b.s01e02.mkv', '/tv/B/Season 01/B.S01E02.mkv', '1399', 'B', 2011, 456, 1, '2026-01-01T00:00:00Z')",
            )
            .execute(&mut *conn)
            .await
            .map(|_| ())
        })
        .await
        .unwrap();

        let model = SpoofReadModel::new(main, aux);

        let movies = model.list_movies(None).await.unwrap();
        assert_eq!(movies.len(), 1, "the episode row must not be counted as a movie");
        assert_eq!(movies[0].title, "A");

        let series = model.list_series(None).await.unwrap();
        assert_eq!(series.len(), 1);
        let (record, episodes, episode_files) = &series[0];
        assert_eq!(record.title, "B");
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].season_number, 1);
        assert_eq!(episodes[0].episode_number, 2);
        assert_eq!(episode_files.len(), 1);
    }
}
