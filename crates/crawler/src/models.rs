use serde::{Deserialize, Serialize};

use crate::{ArtistPage, SongPage};

/// One line of `artists.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    pub profile_img: String,
    pub biography: String,
    /// Artist description page URL, the record's unique key.
    pub source_url: String,
}

/// One line of `songs.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    pub name: String,
    /// Performer label exactly as the song page reports it.
    pub artist_name: String,
    pub lyrics: Vec<String>,
    pub cover_img: String,
    pub source_url: String,
}

impl ArtistRecord {
    /// Builds a record only when name, biography and profile image are all
    /// present and non-empty.
    pub fn from_page(page: ArtistPage, source_url: impl Into<String>) -> Option<Self> {
        Some(Self {
            name: non_empty(page.name)?,
            profile_img: non_empty(page.profile_img)?,
            biography: non_empty(page.biography)?,
            source_url: source_url.into(),
        })
    }
}

impl SongRecord {
    /// Builds a record only when every field, lyrics included, is non-empty.
    pub fn from_page(page: SongPage, source_url: impl Into<String>) -> Option<Self> {
        if page.lyrics.is_empty() {
            return None;
        }
        Some(Self {
            name: non_empty(page.name)?,
            artist_name: non_empty(page.artist_name)?,
            lyrics: page.lyrics,
            cover_img: non_empty(page.cover_img)?,
            source_url: source_url.into(),
        })
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}
