use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// `source_files.media_type` (§3): `null` is represented as `None` at the
/// call site rather than as a third enum variant, since "not a media file"
/// and "media file of unknown type" are different states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Tvshow,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tvshow => "tvshow",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaType::Movie),
            "tvshow" => Ok(MediaType::Tvshow),
            other => Err(Error::InvalidMediaType(other.to_string())),
        }
    }
}

/// Extensions the scanner treats as media files (§4.2, closed set).
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "3gp", "asf", "rm",
    "rmvb", "ts", "m2ts",
];

/// Case-insensitive filename markers the scanner uses to guess a TV-show
/// file apart from a movie (§4.2 step 3).
const TV_MARKERS: &[&str] = &["s0", "season", "episode", "e0", "ep0"];

/// Classify a filename's media type from extension + naming convention. None
/// means the extension isn't a recognized media extension at all.
pub fn classify(filename: &str) -> Option<MediaType> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    if !MEDIA_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    let lower = filename.to_lowercase();
    if TV_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Some(MediaType::Tvshow)
    } else {
        Some(MediaType::Movie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_movie_by_default() {
        assert_eq!(classify("Inception.2010.mkv"), Some(MediaType::Movie));
    }

    #[test]
    fn classifies_tvshow_by_marker() {
        assert_eq!(
            classify("Show.Name.S01E02.mkv"),
            Some(MediaType::Tvshow)
        );
        assert_eq!(
            classify("Show Name - Season 1 - Episode 2.mkv"),
            Some(MediaType::Tvshow)
        );
    }

    #[test]
    fn non_media_extension_is_none() {
        assert_eq!(classify("readme.txt"), None);
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("SHOW.S01E01.MKV"), Some(MediaType::Tvshow));
    }
}
