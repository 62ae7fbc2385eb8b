use clap::Parser;
use music_crawler::CrawlOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Crawl artist and song metadata into JSON-lines files and image folders.
#[derive(Debug, Parser)]
#[command(name = "spider", version)]
pub struct Cli {
    /// Directory receiving artists.json, songs.json and the image folders
    #[arg(long, env = "SPIDER_OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Stop once more than this many artists are saved (and --max-songs is exceeded)
    #[arg(long, default_value_t = 100)]
    pub max_artists: usize,

    /// Stop once more than this many songs are saved (and --max-artists is exceeded)
    #[arg(long, default_value_t = 2000)]
    pub max_songs: usize,

    /// Songs taken from each artist's homepage
    #[arg(long, default_value_t = 30)]
    pub song_cap: usize,

    /// Category ids to scan instead of the built-in list
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<u32>,

    /// Milliseconds to wait between category page fetches
    #[arg(long, default_value_t = 200)]
    pub category_delay_ms: u64,

    /// Skip artist and cover image downloads
    #[arg(long)]
    pub no_images: bool,
}

impl Cli {
    pub fn crawl_options(&self) -> CrawlOptions {
        let mut options = CrawlOptions::default()
            .with_output_dir(self.output_dir.clone())
            .with_stop(self.max_artists, self.max_songs)
            .with_category_delay(Duration::from_millis(self.category_delay_ms));

        if !self.categories.is_empty() {
            options = options.with_categories(self.categories.clone());
        }
        options.song_cap = self.song_cap;
        if self.no_images {
            options = options.without_images();
        }
        options
    }
}
