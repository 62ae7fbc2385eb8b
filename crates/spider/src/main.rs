mod cli;

use clap::Parser;
use music_crawler::{Crawler, CrawlerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "music_crawler=info,spider=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = CrawlerConfig::from_env()?;
    if let Some(warning) = session_cookie_warning(&config) {
        tracing::warn!("{}", warning);
    }
    let options = cli.crawl_options();

    tracing::info!(
        "Crawling {} categories into {}",
        options.category_ids.len(),
        options.output_dir.display()
    );

    let crawler = Crawler::with_config(config);
    let summary = crawler.crawl(options).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn session_cookie_warning(config: &CrawlerConfig) -> Option<&'static str> {
    config
        .cookies
        .is_empty()
        .then_some("SPIDER_COOKIES is not set, page requests carry no session cookies")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_without_session_cookies() {
        assert!(session_cookie_warning(&CrawlerConfig::default()).is_some());

        let config = CrawlerConfig::default().with_cookie("MUSIC_U", "token");
        assert!(session_cookie_warning(&config).is_none());
    }
}
