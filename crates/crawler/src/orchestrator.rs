use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    extractor, parse_artist_page, parse_song_page, store, ArtistRecord, CrawlOptions,
    CrawlerConfig, Endpoints, FetchContext, OutputLayout, ReqwestTransport, Result, SongRecord,
    Transport,
};

/// Counters reported at the end of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    pub artists_discovered: usize,
    pub artists_persisted: usize,
    /// Already present in `artists.json` from an earlier run.
    pub artists_resumed: usize,
    /// Fetch failed, page incomplete, or no songs listed.
    pub artists_skipped: usize,
    pub songs_persisted: usize,
    /// Already present in `songs.json` from an earlier run.
    pub songs_resumed: usize,
    pub songs_skipped: usize,
    pub stop_condition_met: bool,
}

/// Drives one sequential crawl: discover artists, then for each new artist
/// fetch its songs, persist records and download images.
pub struct CrawlOrchestrator<T = ReqwestTransport> {
    ctx: FetchContext<T>,
    endpoints: Endpoints,
    options: CrawlOptions,
    layout: OutputLayout,
}

impl CrawlOrchestrator<ReqwestTransport> {
    pub fn new(config: Arc<CrawlerConfig>, options: CrawlOptions) -> Result<Self> {
        config.validate()?;
        let endpoints = Endpoints::new(&config.base_url)?;
        let ctx = FetchContext::new(config)?;
        Ok(Self::from_parts(ctx, endpoints, options))
    }
}

impl<T: Transport> CrawlOrchestrator<T> {
    pub fn with_transport(
        config: Arc<CrawlerConfig>,
        options: CrawlOptions,
        transport: T,
    ) -> Result<Self> {
        config.validate()?;
        let endpoints = Endpoints::new(&config.base_url)?;
        let ctx = FetchContext::with_transport(config, transport);
        Ok(Self::from_parts(ctx, endpoints, options))
    }

    fn from_parts(ctx: FetchContext<T>, endpoints: Endpoints, options: CrawlOptions) -> Self {
        let layout = OutputLayout::new(options.output_dir.clone());
        Self {
            ctx,
            endpoints,
            options,
            layout,
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Artist ids linked from every configured category page. Categories
    /// that cannot be fetched contribute nothing.
    pub async fn discover_artist_ids(&self) -> HashSet<String> {
        let mut ids = HashSet::new();

        for category_id in &self.options.category_ids {
            let url = self.endpoints.category_url(*category_id);
            let Some(html) = self.ctx.fetch(&url).await else {
                warn!("Category {} unavailable, skipping", category_id);
                continue;
            };

            let found = extractor::extract_artist_ids(&html);
            debug!("Category {} lists {} artists", category_id, found.len());
            ids.extend(found);

            tokio::time::sleep(self.options.category_delay).await;
        }

        ids
    }

    pub async fn run(&self) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();

        let mut artist_ids: Vec<String> = self.discover_artist_ids().await.into_iter().collect();
        artist_ids.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        summary.artists_discovered = artist_ids.len();
        info!("Discovered {} artists", artist_ids.len());

        let existing_artists = store::load_existing_source_urls(&self.layout.artists_file()).await?;
        let existing_songs = store::load_existing_source_urls(&self.layout.songs_file()).await?;
        info!(
            "Resuming with {} artists and {} songs already on disk",
            existing_artists.len(),
            existing_songs.len()
        );

        let mut visited = HashSet::new();

        for artist_id in &artist_ids {
            let source_url = self.endpoints.artist_desc_url(artist_id);
            if existing_artists.contains(source_url.as_str()) {
                summary.artists_resumed += 1;
                continue;
            }
            if !visited.insert(source_url.to_string()) {
                continue;
            }

            let Some(artist) = self
                .crawl_artist(artist_id, &source_url, &existing_songs, &mut summary)
                .await?
            else {
                summary.artists_skipped += 1;
                continue;
            };

            summary.artists_persisted += 1;
            info!(
                "Artist #{} {}: {} songs, {} songs total",
                summary.artists_persisted, artist.name, artist.songs, summary.songs_persisted
            );

            if self
                .options
                .stop
                .is_met(summary.artists_persisted, summary.songs_persisted)
            {
                info!(
                    "Stopping after {} artists and {} songs",
                    summary.artists_persisted, summary.songs_persisted
                );
                summary.stop_condition_met = true;
                break;
            }
        }

        info!("Crawl finished: {:?}", summary);
        Ok(summary)
    }

    async fn crawl_artist(
        &self,
        artist_id: &str,
        source_url: &Url,
        existing_songs: &HashSet<String>,
        summary: &mut CrawlSummary,
    ) -> Result<Option<ArtistOutcome>> {
        let Some(html) = self.ctx.fetch(source_url).await else {
            return Ok(None);
        };

        let page = parse_artist_page(&html);
        let Some(record) = ArtistRecord::from_page(page, source_url.as_str()) else {
            debug!("Artist {} page incomplete, skipping", artist_id);
            return Ok(None);
        };

        let home_url = self.endpoints.artist_home_url(artist_id);
        let Some(home) = self.ctx.fetch(&home_url).await else {
            return Ok(None);
        };

        let song_ids = extractor::list_song_ids(&home, self.options.song_cap);
        if song_ids.is_empty() {
            debug!("Artist {} lists no songs, skipping", artist_id);
            return Ok(None);
        }

        let mut songs = 0;
        for song_id in &song_ids {
            match self.crawl_song(song_id, existing_songs).await? {
                SongOutcome::Persisted => songs += 1,
                SongOutcome::Resumed => summary.songs_resumed += 1,
                SongOutcome::Skipped => summary.songs_skipped += 1,
            }
        }
        summary.songs_persisted += songs;

        store::append_record(&self.layout.artists_file(), &record).await?;
        if self.options.download_images {
            let path = self.layout.artist_image_path(&record.name);
            self.download_image(&record.profile_img, &path).await;
        }

        Ok(Some(ArtistOutcome {
            name: record.name,
            songs,
        }))
    }

    // Songs shared between artists are saved once per artist. Only songs
    // from an earlier run's `songs.json` are skipped.
    async fn crawl_song(
        &self,
        song_id: &str,
        existing_songs: &HashSet<String>,
    ) -> Result<SongOutcome> {
        let song_url = self.endpoints.song_url(song_id);
        if existing_songs.contains(song_url.as_str()) {
            return Ok(SongOutcome::Resumed);
        }

        let Some(html) = self.ctx.fetch(&song_url).await else {
            return Ok(SongOutcome::Skipped);
        };

        let page = parse_song_page(&self.ctx, &self.endpoints, &html, song_id).await;
        let Some(record) = SongRecord::from_page(page, song_url.as_str()) else {
            debug!("Song {} incomplete, skipping", song_id);
            return Ok(SongOutcome::Skipped);
        };

        debug!("Saving song {} - {}", record.name, record.artist_name);
        store::append_record(&self.layout.songs_file(), &record).await?;

        if self.options.download_images {
            let path = self.layout.song_image_path(&record.artist_name, &record.name);
            self.download_image(&record.cover_img, &path).await;
        }

        Ok(SongOutcome::Persisted)
    }

    // Image failures never fail the record that references the image.
    async fn download_image(&self, image_url: &str, path: &Path) {
        let url = match Url::parse(image_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Bad image URL {}: {}", image_url, e);
                return;
            }
        };

        match self.ctx.fetch_bytes(&url).await {
            Ok(bytes) => {
                if let Err(e) = store::write_image(path, &bytes).await {
                    warn!("Failed to write {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Image download from {} failed: {}", url, e),
        }
    }
}

struct ArtistOutcome {
    name: String,
    songs: usize,
}

enum SongOutcome {
    Persisted,
    Resumed,
    Skipped,
}
