use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use crate::{CrawlerError, Result};

static ARTIST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/artist\?id=(\d+)").expect("artist id pattern"));
static SONG_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/song\?id=(\d+)").expect("song id pattern"));
// Everything after a `[...]` tag on a lyric line.
static LYRIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[.*?\](.*)").expect("lyric line pattern"));

/// Artist ids linked from a category listing page.
pub fn extract_artist_ids(html: &str) -> HashSet<String> {
    ARTIST_ID
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Song ids linked from an artist homepage, de-duplicated and capped.
///
/// Ids are kept in first-seen document order, so the cap always keeps the
/// earliest links on the page.
pub fn list_song_ids(html: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    SONG_ID
        .captures_iter(html)
        .map(|cap| cap[1].to_string())
        .filter(|id| seen.insert(id.clone()))
        .take(limit)
        .collect()
}

/// Lyric lines from timestamp-tagged lyric text, tags stripped, blanks dropped.
pub fn parse_lyric_text(text: &str) -> Vec<String> {
    LYRIC_LINE
        .captures_iter(text)
        .map(|cap| cap[1].to_string())
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// Lyric lines from a lyric endpoint JSON body (`lrc.lyric`).
pub fn parse_lyric_response(body: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(body.trim())?;
    let lyric = value
        .get("lrc")
        .and_then(|lrc| lrc.get("lyric"))
        .and_then(Value::as_str)
        .ok_or_else(|| CrawlerError::ParseError("missing lrc.lyric".to_string()))?;

    Ok(parse_lyric_text(lyric))
}
