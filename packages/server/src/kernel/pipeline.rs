//! HTTP crawl pipeline - fetches pages with reqwest and extracts markdown
//!
//! This is the production document producer behind [`BaseCrawlPipeline`]:
//! - reqwest for HTTP requests
//! - scraper crate for HTML parsing and link discovery
//! - htmd for HTML to Markdown conversion
//!
//! Limitations:
//! - No JavaScript rendering (static HTML sites only)

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use super::queue::Document;
use super::traits::{BaseCrawlPipeline, CrawlEvent, CrawlRequest};

/// HTTP crawl pipeline using reqwest + scraper + htmd.
pub struct HttpCrawlPipeline {
    client: reqwest::Client,
}

impl HttpCrawlPipeline {
    pub fn new() -> Result<Self> {
        // Browser-like User-Agent to avoid bot detection
        let user_agent = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Fetch raw HTML from a URL
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {} for {}", status, url);
        }

        response
            .text()
            .await
            .context("Failed to read response body")
    }

    /// Fetch one page and convert it to a document.
    async fn fetch_document(&self, url: &str) -> Result<(Document, Vec<String>)> {
        let html = self.fetch_html(url).await?;
        let parsed = Html::parse_document(&html);

        let links = match Url::parse(url) {
            Ok(base) => extract_links(&parsed, &base),
            Err(_) => Vec::new(),
        };

        let markdown = html_to_markdown(&html);
        Ok((Document::new(url, markdown), links))
    }
}

#[async_trait]
impl BaseCrawlPipeline for HttpCrawlPipeline {
    async fn run(
        &self,
        request: CrawlRequest,
        events: mpsc::Sender<CrawlEvent>,
    ) -> Result<Vec<Document>> {
        let mut frontier: Vec<String> = request.targets.clone();
        let mut seen: HashSet<String> = frontier.iter().cloned().collect();
        let mut documents = Vec::new();

        // Single mode visits exactly the given targets; crawl mode grows
        // the frontier with same-host links up to the page budget.
        let budget = if request.crawl {
            request.limit.max(1) as usize
        } else {
            frontier.len()
        };

        let mut index = 0;
        while index < frontier.len() && documents.len() < budget {
            let url = frontier[index].clone();
            index += 1;

            match self.fetch_document(&url).await {
                Ok((document, links)) => {
                    documents.push(document.clone());

                    if request.crawl {
                        for link in links {
                            if seen.len() >= budget {
                                break;
                            }
                            if seen.insert(link.clone()) {
                                frontier.push(link);
                            }
                        }
                    }

                    let total = frontier.len().max(documents.len()) as u32;
                    let _ = events
                        .send(CrawlEvent {
                            current: documents.len() as u32,
                            total,
                            step: "SCRAPING".to_string(),
                            document: Some(document),
                        })
                        .await;
                }
                Err(e) => {
                    // A crawl survives individual bad pages, but a
                    // single-target fetch failing is the job failing.
                    if request.crawl {
                        warn!(url = %url, error = %e, "skipping page");
                    } else if frontier.len() == 1 {
                        return Err(e);
                    } else {
                        warn!(url = %url, error = %e, "skipping target");
                    }
                }
            }
        }

        debug!(pages = documents.len(), "crawl pipeline finished");
        Ok(documents)
    }
}

/// Convert HTML to Markdown, falling back to stripped text.
fn html_to_markdown(html: &str) -> String {
    htmd::convert(html).unwrap_or_else(|_| {
        let document = Html::parse_document(html);
        document.root_element().text().collect::<String>()
    })
}

/// Extract same-host links from a parsed page.
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let link_selector = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return vec![],
    };

    let base_host = base_url.host_str().unwrap_or("");

    document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base_url.join(href).ok())
        .filter(|url| {
            url.host_str() == Some(base_host)
                && (url.scheme() == "http" || url.scheme() == "https")
                && url.fragment().is_none()
        })
        .map(|url| {
            // Normalize: drop query params and trailing slash
            let mut normalized = url.clone();
            normalized.set_query(None);
            let path = normalized.path().trim_end_matches('/').to_string();
            normalized.set_path(if path.is_empty() { "/" } else { &path });
            normalized.to_string()
        })
        .collect()
}
