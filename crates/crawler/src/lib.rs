pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod extractor;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod store;

pub use client::*;
pub use config::*;
pub use endpoints::*;
pub use error::*;
pub use models::*;
pub use orchestrator::*;
pub use parser::*;
pub use store::OutputLayout;

use std::sync::Arc;

/// Entry point used by the `spider` binary.
pub struct Crawler {
    config: Arc<CrawlerConfig>,
}

impl Crawler {
    pub fn with_config(config: CrawlerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub async fn crawl(&self, options: CrawlOptions) -> Result<CrawlSummary> {
        let orchestrator = CrawlOrchestrator::new(self.config.clone(), options)?;
        orchestrator.run().await
    }
}
