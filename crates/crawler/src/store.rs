use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::Result;

pub const ARTISTS_FILE: &str = "artists.json";
pub const SONGS_FILE: &str = "songs.json";
pub const ARTIST_IMAGE_DIR: &str = "artist_images";
pub const SONG_IMAGE_DIR: &str = "song_images";

/// Fixed file layout under the crawl output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn artists_file(&self) -> PathBuf {
        self.root.join(ARTISTS_FILE)
    }

    pub fn songs_file(&self) -> PathBuf {
        self.root.join(SONGS_FILE)
    }

    pub fn artist_image_dir(&self) -> PathBuf {
        self.root.join(ARTIST_IMAGE_DIR)
    }

    pub fn song_image_dir(&self) -> PathBuf {
        self.root.join(SONG_IMAGE_DIR)
    }

    /// `artist_images/<artist>.jpg`
    pub fn artist_image_path(&self, artist_name: &str) -> PathBuf {
        self.artist_image_dir()
            .join(format!("{}.jpg", sanitize_file_name(artist_name)))
    }

    /// `song_images/<artist>/<song>.jpg`
    pub fn song_image_path(&self, artist_name: &str, song_name: &str) -> PathBuf {
        self.song_image_dir()
            .join(sanitize_file_name(artist_name))
            .join(format!("{}.jpg", sanitize_file_name(song_name)))
    }
}

/// Maps a display name onto a single safe path component.
///
/// Separators, characters reserved on Windows and control characters become
/// `_`. Distinct names can collide after this mapping; the later write wins.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim().trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Source URLs already recorded in a JSON-lines output file.
///
/// A missing file is an empty set. Lines that are not JSON objects with a
/// string `source_url` are skipped.
pub async fn load_existing_source_urls(path: &Path) -> Result<HashSet<String>> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e.into()),
    };

    let mut urls = HashSet::new();
    let mut skipped = 0usize;

    for line in contents.split(|b| *b == b'\n') {
        let line = line.trim_ascii();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(entry) => {
                if let Some(url) = entry.get("source_url").and_then(Value::as_str) {
                    urls.insert(url.to_string());
                }
            }
            Err(_) => skipped += 1,
        }
    }

    debug!(
        "Loaded {} source URLs from {} ({} malformed lines skipped)",
        urls.len(),
        path.display(),
        skipped
    );
    Ok(urls)
}

/// Appends one record as a compact JSON line, creating parent directories.
pub async fn append_record<R: Serialize>(path: &Path, record: &R) -> Result<()> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    ensure_parent(path).await?;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

/// Writes raw image bytes, replacing any existing file at `path`.
pub async fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArtistRecord;
    use tempfile::tempdir;

    fn artist(id: u32) -> ArtistRecord {
        ArtistRecord {
            name: format!("歌手{}", id),
            profile_img: format!("https://p1.music.126.net/{}.jpg", id),
            biography: "bio".to_string(),
            source_url: format!("https://music.163.com/artist/desc?id={}", id),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("周杰伦"), "周杰伦");
        assert_eq!(sanitize_file_name("AC/DC"), "AC_DC");
        assert_eq!(sanitize_file_name("What?: \"Live\" <1|2>"), "What__ _Live_ _1_2_");
        assert_eq!(sanitize_file_name(".."), "_");
        assert_eq!(sanitize_file_name("  "), "_");
        assert_eq!(sanitize_file_name("name..."), "name");
        assert_eq!(sanitize_file_name("tab\there"), "tab_here");
    }

    #[test]
    fn test_image_paths_stay_inside_layout() {
        let layout = OutputLayout::new("out");
        assert_eq!(
            layout.artist_image_path("../../etc/passwd"),
            PathBuf::from("out/artist_images/.._.._etc_passwd.jpg")
        );
        assert_eq!(
            layout.song_image_path("S.H.E", "Super Star"),
            PathBuf::from("out/song_images/S.H.E/Super Star.jpg")
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_set() {
        let dir = tempdir().unwrap();
        let urls = load_existing_source_urls(&dir.path().join("artists.json")).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("artists.json");

        for id in 1..=3 {
            append_record(&path, &artist(id)).await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("歌手1"));

        let urls = load_existing_source_urls(&path).await.unwrap();
        assert_eq!(urls.len(), 3);
        assert!(urls.contains("https://music.163.com/artist/desc?id=2"));
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("artists.json");

        for id in 1..=4 {
            append_record(&path, &artist(id)).await.unwrap();
        }
        let mut contents = tokio::fs::read(&path).await.unwrap();
        contents.extend_from_slice(b"{\"name\": \"truncated\n\n");
        contents.extend_from_slice(&[0xff, 0xfe, b'\n']);
        contents.extend_from_slice(b"{\"name\": \"no url\"}\n");
        tokio::fs::write(&path, contents).await.unwrap();

        let urls = load_existing_source_urls(&path).await.unwrap();
        assert_eq!(urls.len(), 4);
    }

    #[tokio::test]
    async fn test_write_image_creates_directories() {
        let dir = tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let path = layout.song_image_path("五月天", "倔强");

        write_image(&path, b"jpeg").await.unwrap();
        write_image(&path, b"jpeg2").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"jpeg2");
    }
}
