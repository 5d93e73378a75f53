//! Portugalio company directory scraper.
//!
//! The search page for a NIF embeds the matching company's JSON-LD
//! `Organization` on a single line.

use async_trait::async_trait;
use nifdata_core::{Nif, PartialRecord, Source};

use crate::http::{browser_headers, get_text};
use crate::jsonld::LdOrganization;
use crate::source::{SourceAdapter, SourceError};

const BASE_URL: &str = "https://www.portugalio.com/";

pub struct PortugalioAdapter {
    client: reqwest::Client,
}

impl PortugalioAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for PortugalioAdapter {
    fn source(&self) -> Source {
        Source::Portugalio
    }

    async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError> {
        let url = format!("{BASE_URL}pesquisa/?q={nif}&tipo=empresas");
        let html = get_text(&self.client, &url, browser_headers(BASE_URL)).await?;
        let json = inline_ld_json(&html)
            .ok_or_else(|| SourceError::Shape(format!("no ld+json object for {nif}")))?;
        Ok(LdOrganization::parse(json)?.into_partial(None))
    }
}

/// The `{...}` object on the line carrying `application/ld+json`: from the
/// first `">{` to the last `}<`.
fn inline_ld_json(html: &str) -> Option<&str> {
    let line = html.lines().find(|l| l.contains("application/ld+json"))?;
    let start = line.find("\">{")? + 2;
    let end = line.rfind("}<")? + 1;
    (end > start).then(|| &line[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_inline_object() {
        let html = concat!(
            "<html><head>\n",
            r#"<script type="application/ld+json">{"name":"Foo Lda","url":["https://www.portugalio.com/foo/"],"description":"Comércio {geral}"}</script>"#,
            "\n</head></html>"
        );
        let json = inline_ld_json(html).unwrap();
        let record = LdOrganization::parse(json).unwrap().into_partial(None);
        assert_eq!(record.name.as_deref(), Some("Foo Lda"));
        assert_eq!(record.description.as_deref(), Some("Comércio {geral}"));
        assert_eq!(record.source_url.as_deref(), Some("https://www.portugalio.com/foo/"));
    }

    #[test]
    fn page_without_object_yields_none() {
        assert_eq!(inline_ld_json("<html></html>"), None);
        assert_eq!(
            inline_ld_json(r#"<script type="application/ld+json"></script>"#),
            None
        );
    }
}
