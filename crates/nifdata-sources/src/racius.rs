//! Racius company directory scraper.
//!
//! Two requests per lookup: the search page, whose first result row links to
//! the company page, then the company page itself, which embeds a JSON-LD
//! `Organization` block.

use async_trait::async_trait;
use nifdata_core::{Nif, PartialRecord, Source};
use tracing::debug;

use crate::http::{browser_headers, get_text};
use crate::jsonld::LdOrganization;
use crate::source::{SourceAdapter, SourceError};

const BASE_URL: &str = "https://www.racius.com/";
const RESULT_LINK_MARKER: &str = "results__col-link";
const LD_JSON_OPEN: &str = "<script type=\"application/ld+json\">";
const SCRIPT_CLOSE: &str = "</script>";

pub struct RaciusAdapter {
    client: reqwest::Client,
}

impl RaciusAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for RaciusAdapter {
    fn source(&self) -> Source {
        Source::Racius
    }

    async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError> {
        let search_url = format!("{BASE_URL}pesquisa/?q={nif}");
        let search = get_text(&self.client, &search_url, browser_headers(BASE_URL)).await?;
        let path = first_result_path(&search)
            .ok_or_else(|| SourceError::Shape(format!("no search result link for {nif}")))?;

        let page_url = format!("{BASE_URL}{}", path.trim_start_matches('/'));
        debug!(%nif, url = %page_url, "fetching racius company page");
        let page = get_text(&self.client, &page_url, browser_headers(BASE_URL)).await?;
        let json = ld_json_block(&page)
            .ok_or_else(|| SourceError::Shape(format!("no ld+json block on {page_url}")))?;

        Ok(LdOrganization::parse(json)?.into_partial(Some(page_url)))
    }
}

/// The `href` of the first search result row.
fn first_result_path(html: &str) -> Option<&str> {
    let line = html.lines().find(|l| l.contains(RESULT_LINK_MARKER))?;
    let rest = &line[line.find("href=\"")? + "href=\"".len()..];
    let path = &rest[..rest.find('"')?];
    (!path.is_empty()).then_some(path)
}

/// Body of the first `<script type="application/ld+json">` element.
fn ld_json_block(html: &str) -> Option<&str> {
    let start = html.find(LD_JSON_OPEN)? + LD_JSON_OPEN.len();
    let len = html[start..].find(SCRIPT_CLOSE)?;
    Some(&html[start..start + len])
}
