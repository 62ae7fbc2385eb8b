use url::Url;

use crate::{CrawlerError, Result};

/// Upstream page and API locations, rooted at a configurable base.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(CrawlerError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base })
    }

    pub fn category_url(&self, category_id: u32) -> Url {
        self.with_id("/discover/artist/cat", &category_id.to_string())
    }

    pub fn artist_desc_url(&self, artist_id: &str) -> Url {
        self.with_id("/artist/desc", artist_id)
    }

    pub fn artist_home_url(&self, artist_id: &str) -> Url {
        self.with_id("/artist", artist_id)
    }

    pub fn song_url(&self, song_id: &str) -> Url {
        self.with_id("/song", song_id)
    }

    pub fn lyric_url(&self, song_id: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path("/api/song/lyric");
        url.query_pairs_mut()
            .append_pair("id", song_id)
            .append_pair("lv", "1")
            .append_pair("kv", "1")
            .append_pair("tv", "1");
        url
    }

    fn with_id(&self, path: &str, id: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.query_pairs_mut().append_pair("id", id);
        url
    }
}
