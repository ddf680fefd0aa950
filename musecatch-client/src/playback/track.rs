//! Playable track derived from a library song

use musecatch_common::api::Song;
use std::path::Path;

/// Artist shown when the filename does not carry one
pub const UNKNOWN_ARTIST: &str = "unknown";

/// A playable item
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub cover_url: Option<String>,
    /// Declared duration in seconds; 0 when unknown
    pub duration_seconds: f64,
    /// Range-addressable audio URL
    pub stream_locator: String,
}

impl Track {
    /// Build a track from a library song and its stream locator
    pub fn from_song(song: &Song, stream_locator: impl Into<String>) -> Self {
        Self {
            id: song.id,
            title: song.title.clone(),
            artist: artist_from_filename(&song.filename),
            cover_url: None,
            duration_seconds: 0.0,
            stream_locator: stream_locator.into(),
        }
    }
}

/// Artist from the `title-artist-source.ext` naming convention
///
/// Heuristic only: the second-from-last `-` segment of the file stem,
/// trimmed of `_` and whitespace. Fewer than two segments (or an empty
/// segment) yields [`UNKNOWN_ARTIST`]. Titles that themselves contain `-`
/// shift the segments and can misattribute the artist.
pub fn artist_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);

    let segments: Vec<&str> = stem.split('-').collect();
    if segments.len() < 2 {
        return UNKNOWN_ARTIST.to_string();
    }

    let artist = segments[segments.len() - 2].trim_matches(|c: char| c == '_' || c.is_whitespace());
    if artist.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artist.to_string()
    }
}
