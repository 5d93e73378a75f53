//! Shared HTTP plumbing for the scraping and API adapters.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::info;

use crate::europa::EuropaAdapter;
use crate::portugalio::PortugalioAdapter;
use crate::racius::RaciusAdapter;
use crate::set::SourceSet;
use crate::source::{SourceError, Throttled};

/// Requester VAT number sent with VIES queries unless configured otherwise.
pub const DEFAULT_VIES_REQUESTER: &str = "516969250";

/// Settings for the HTTP-backed sources.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between dispatches on each scraped site.
    pub cool_down: Duration,
    /// VAT number identifying the requester to VIES.
    pub vies_requester: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cool_down: Duration::from_secs(60),
            vies_requester: DEFAULT_VIES_REQUESTER.to_string(),
        }
    }
}

/// Headers a desktop browser sends on navigation; the scraped sites
/// reject bare clients.
const BROWSER_HEADERS: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.6"),
    (
        "sec-ch-ua",
        "\"Not A(Brand\";v=\"99\", \"Brave\";v=\"121\", \"Chromium\";v=\"121\"",
    ),
    ("sec-ch-ua-mobile", "?0"),
    ("sec-ch-ua-platform", "\"Windows\""),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "same-origin"),
    ("sec-fetch-user", "?1"),
    ("sec-gpc", "1"),
    ("upgrade-insecure-requests", "1"),
];

pub(crate) fn browser_headers(referer: &'static str) -> HeaderMap {
    let mut headers: HeaderMap = BROWSER_HEADERS
        .iter()
        .map(|&(name, value)| {
            (
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            )
        })
        .collect();
    headers.insert(reqwest::header::REFERER, HeaderValue::from_static(referer));
    headers
}

pub(crate) fn client(config: &HttpConfig) -> Result<reqwest::Client, SourceError> {
    Ok(reqwest::Client::builder().timeout(config.timeout).build()?)
}

/// GET `url` and return the body, failing on a non-success status.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
) -> Result<String, SourceError> {
    let resp = client.get(url).headers(headers).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceError::Server {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }
    Ok(resp.text().await?)
}

/// Wire the production sources: Racius and Portugalio each behind their own
/// rate-limited lane, VIES called directly.
pub fn build_sources(config: &HttpConfig) -> Result<SourceSet, SourceError> {
    let client = client(config)?;
    info!(
        cool_down_secs = config.cool_down.as_secs(),
        timeout_secs = config.timeout.as_secs(),
        "building HTTP sources"
    );
    Ok(SourceSet::new(
        Arc::new(Throttled::new(
            RaciusAdapter::new(client.clone()),
            config.cool_down,
        )),
        Arc::new(Throttled::new(
            PortugalioAdapter::new(client.clone()),
            config.cool_down,
        )),
        Arc::new(EuropaAdapter::new(client, config.vies_requester.clone())),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_carry_referer() {
        let headers = browser_headers("https://www.racius.com/");
        assert_eq!(headers["referer"], "https://www.racius.com/");
        assert_eq!(headers["sec-fetch-mode"], "navigate");
        assert_eq!(headers.len(), BROWSER_HEADERS.len() + 1);
    }

    #[test]
    fn default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.cool_down, Duration::from_secs(60));
        assert_eq!(config.vies_requester, DEFAULT_VIES_REQUESTER);
    }

    #[tokio::test]
    async fn build_sources_needs_no_network() {
        assert!(build_sources(&HttpConfig::default()).is_ok());
    }
}
