//! Same-origin breadth-first crawler
//!
//! Starts from a seed URL, saves every fetched page as an HTML file named
//! after its path and follows links that stay on the seed's host, up to a
//! page cap. Fetches run strictly one after another with a polite delay.

use reqwest::Client;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{extract_links, same_origin_host};

/// Statuses treated as a hard denial; retrying would not change them
pub const DENIED_STATUSES: &[u16] = &[401, 403, 429];

/// Longest filename stem derived from a URL path
pub const MAX_FILENAME_LEN: usize = 80;

/// Literal that makes the robots check refuse the crawl
const ROBOTS_BLOCK: &str = "Disallow: /";

/// Crawler configuration
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Where the crawl starts; also fixes the allowed host
    pub seed: String,
    /// Directory receiving one .html file per page
    pub output_dir: PathBuf,
    /// Page cap
    pub max_pages: usize,
    /// Pause between fetches
    pub rate_delay: Duration,
    /// Attempts per URL on transport failure
    pub max_retries: u32,
    /// Backoff before retry n is `retry_backoff ^ n` seconds
    pub retry_backoff: f64,
    pub fetch_timeout_secs: u64,
    pub robots_timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed: "https://example.com/".to_string(),
            output_dir: PathBuf::from("scraped_pages"),
            max_pages: 15,
            rate_delay: Duration::from_secs(8),
            max_retries: 3,
            retry_backoff: 2.5,
            fetch_timeout_secs: 20,
            robots_timeout_secs: 10,
        }
    }
}

/// Why a single URL produced no page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("{0} – access denied / rate limit")]
    Denied(u16),

    #[error("client error {0}")]
    HttpStatus(u16),

    #[error("gave up after {attempts} tries: {reason}")]
    Unreachable { attempts: u32, reason: String },
}

/// Errors that stop a crawl
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid seed URL {url}: {reason}")]
    InvalidSeed { url: String, reason: String },

    #[error("robots.txt at {0} disallows crawling")]
    RobotsDisallowed(String),

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Queue of URLs awaiting fetch plus everything already processed
///
/// A URL is queued at most once and lands in the visited set when it is
/// processed, whatever the fetch outcome.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<Url>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new(seed: Url) -> Self {
        let mut frontier = Self::default();
        frontier.queued.insert(seed.as_str().to_string());
        frontier.queue.push_back(seed);
        frontier
    }

    pub fn pop(&mut self) -> Option<Url> {
        let url = self.queue.pop_front()?;
        self.queued.remove(url.as_str());
        Some(url)
    }

    pub fn mark_visited(&mut self, url: &Url) {
        self.visited.insert(url.as_str().to_string());
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    /// Queue a link if it is new and the page budget leaves room for it
    pub fn offer(&mut self, url: Url, pages_saved: usize, max_pages: usize) -> bool {
        let key = url.as_str();
        if self.visited.contains(key) || self.queued.contains(key) {
            return false;
        }
        if pages_saved + self.queue.len() >= max_pages {
            return false;
        }
        self.queued.insert(key.to_string());
        self.queue.push_back(url);
        true
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawledPage {
    /// Where redirects ended; relative links resolve against this
    pub final_url: Url,
    pub html: String,
}

/// What a finished crawl did
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    /// Distinct files on disk. URLs mapping to the same filename overwrite
    /// each other and count once.
    pub pages_saved: usize,
    pub visited: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub files: Vec<PathBuf>,
}

/// Filename for a page, derived from its URL path
pub fn output_filename(url: &Url) -> String {
    let trimmed = url.path().trim_matches('/');
    let stem = if trimmed.is_empty() { "index" } else { trimmed };
    let mut name: String = stem
        .replace(['/', '?', '='], "_")
        .chars()
        .take(MAX_FILENAME_LEN)
        .collect();
    if !name.ends_with(".html") {
        name.push_str(".html");
    }
    name
}

/// Provenance comment written above every saved page
pub fn provenance_header(url: &Url) -> String {
    format!(
        "<!-- Scraped by {} v{} from {} -->\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        url
    )
}

/// Write a page with its provenance header into `dir`
pub async fn save_page(dir: &Path, url: &Url, html: &str) -> Result<PathBuf, CrawlError> {
    let path = dir.join(output_filename(url));
    let mut contents = provenance_header(url);
    contents.push_str(html);

    tokio::fs::write(&path, contents)
        .await
        .map_err(|source| CrawlError::Io {
            path: path.clone(),
            source,
        })?;
    Ok(path)
}

/// Breadth-first crawler bound to one seed host
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    seed: Url,
}

impl Crawler {
    pub fn new(client: Client, config: CrawlConfig) -> Result<Self, CrawlError> {
        let seed = Url::parse(&config.seed).map_err(|e| CrawlError::InvalidSeed {
            url: config.seed.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(seed.scheme(), "http" | "https") || seed.host_str().is_none() {
            return Err(CrawlError::InvalidSeed {
                url: config.seed.clone(),
                reason: "expected an http(s) URL with a host".to_string(),
            });
        }
        Ok(Self {
            client,
            config,
            seed,
        })
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn robots_url(&self) -> Url {
        let mut robots = self.seed.clone();
        robots.set_path("/robots.txt");
        robots.set_query(None);
        robots.set_fragment(None);
        robots
    }

    /// Naive robots.txt check; anything but an explicit block allows the crawl
    pub async fn allowed_by_robots(&self) -> bool {
        let robots_url = self.robots_url();
        let resp = self
            .client
            .get(robots_url.clone())
            .timeout(Duration::from_secs(self.config.robots_timeout_secs))
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().as_u16() == 200 => match resp.text().await {
                Ok(body) if body.contains(ROBOTS_BLOCK) => {
                    error!("robots.txt says {} → aborting", ROBOTS_BLOCK);
                    false
                }
                Ok(_) => true,
                Err(e) => {
                    warn!("robots.txt unreadable: {} → continuing", e);
                    true
                }
            },
            Ok(resp) => {
                warn!("robots.txt not found ({}) → continuing anyway", resp.status());
                true
            }
            Err(e) => {
                warn!("robots.txt check failed: {} → continuing", e);
                true
            }
        }
    }

    /// GET a page, retrying transport failures with exponential backoff
    pub async fn fetch(&self, url: &Url) -> Result<CrawledPage, FetchFailure> {
        let attempts = self.config.max_retries.max(1);
        let mut reason = String::new();

        for attempt in 1..=attempts {
            let resp = self
                .client
                .get(url.clone())
                .timeout(Duration::from_secs(self.config.fetch_timeout_secs))
                .send()
                .await;

            match resp {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if DENIED_STATUSES.contains(&status) {
                        return Err(FetchFailure::Denied(status));
                    }
                    if status >= 400 {
                        return Err(FetchFailure::HttpStatus(status));
                    }
                    let final_url = resp.url().clone();
                    match resp.text().await {
                        Ok(html) => {
                            debug!("OK ({} bytes) {}", html.len(), final_url);
                            return Ok(CrawledPage { final_url, html });
                        }
                        Err(e) => reason = e.to_string(),
                    }
                }
                Err(e) => reason = e.to_string(),
            }

            if attempt < attempts {
                let wait = self.config.retry_backoff.powi(attempt as i32).max(0.0);
                warn!("Retry {}/{} for {}: {}", attempt, attempts, url, reason);
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }
        }

        Err(FetchFailure::Unreachable { attempts, reason })
    }

    /// Run the crawl to completion
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        if !self.allowed_by_robots().await {
            return Err(CrawlError::RobotsDisallowed(self.robots_url().to_string()));
        }

        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CrawlError::Io {
                path: dir.clone(),
                source,
            })?;

        let max_pages = self.config.max_pages;
        let start = Instant::now();
        let mut frontier = Frontier::new(self.seed.clone());
        let mut files = Vec::new();
        let mut failed = 0;

        info!(
            "Target → {} | {} pages max | {:?} delay",
            self.seed, max_pages, self.config.rate_delay
        );

        while files.len() < max_pages {
            let Some(url) = frontier.pop() else {
                break;
            };
            if frontier.is_visited(&url) {
                continue;
            }
            frontier.mark_visited(&url);

            info!("Fetching: {}", url);
            match self.fetch(&url).await {
                Ok(page) => match save_page(dir, &url, &page.html).await {
                    Ok(path) => {
                        if files.contains(&path) {
                            warn!("Overwrote {} with {}", path.display(), url);
                        } else {
                            info!("Saved → {}", path.display());
                            files.push(path);
                        }

                        let mut new_links = 0;
                        if same_origin_host(&page.final_url, &self.seed) {
                            for link in extract_links(&page.final_url, &page.html, &self.seed) {
                                if frontier.offer(link, files.len(), max_pages) {
                                    new_links += 1;
                                }
                            }
                        } else {
                            warn!("{} redirected off-site to {}", url, page.final_url);
                        }
                        info!(
                            "Progress → {}/{} | Queue: {} | New: {}",
                            files.len(),
                            max_pages,
                            frontier.len(),
                            new_links
                        );
                    }
                    Err(e) => {
                        error!("Save failed: {}", e);
                        failed += 1;
                    }
                },
                Err(failure) => {
                    warn!("{}: {}", url, failure);
                    failed += 1;
                }
            }

            if !frontier.is_empty() && files.len() < max_pages && !self.config.rate_delay.is_zero() {
                debug!("Waiting {:?} …", self.config.rate_delay);
                tokio::time::sleep(self.config.rate_delay).await;
            }
        }

        Ok(CrawlSummary {
            pages_saved: files.len(),
            visited: frontier.visited_count(),
            failed,
            elapsed: start.elapsed(),
            files,
        })
    }
}
