//! Concert listings scraping.
//!
//! One fetch of the public listings page per ingestion run. Any fetch or
//! extraction failure aborts the whole scrape with no partial results; the
//! run is idempotent and the next cron tick retries.

pub mod html;
mod listing;

pub use listing::{extract_shows, RawShow};

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::info;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// The listings site serves a degraded page to obvious bots.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Fetches the listings page and extracts upcoming shows.
pub struct ListingScraper {
    client: reqwest::Client,
    listings_url: String,
    origin: String,
}

impl ListingScraper {
    pub fn new(listings_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create listings HTTP client")?;

        Ok(Self {
            client,
            listings_url: listings_url.to_string(),
            origin: derive_origin(listings_url)?,
        })
    }

    /// Scrape the listings page into raw future shows.
    pub async fn scrape(&self) -> Result<Vec<RawShow>> {
        let response = self
            .client
            .get(&self.listings_url)
            .send()
            .await
            .context("Failed to fetch listings page")?;

        if !response.status().is_success() {
            bail!("listings page returned status {}", response.status());
        }

        let page = response
            .text()
            .await
            .context("Failed to read listings page body")?;

        let today = chrono::Local::now().date_naive();
        let shows = extract_shows(&page, &self.origin, today)?;
        info!("Scraped {} upcoming shows from listings page", shows.len());
        Ok(shows)
    }
}

/// `scheme://host[:port]` of a URL, for resolving relative show links.
fn derive_origin(url: &str) -> Result<String> {
    let scheme_end = url
        .find("://")
        .with_context(|| format!("listings URL has no scheme: {}", url))?;
    let rest = &url[scheme_end + 3..];
    if rest.is_empty() {
        bail!("listings URL has no host: {}", url);
    }
    let host_end = rest.find('/').unwrap_or(rest.len());
    Ok(format!("{}{}", &url[..scheme_end + 3], &rest[..host_end]))
}
