//! EU VIES VAT number validation service.

use async_trait::async_trait;
use nifdata_core::{Address, Nif, PartialRecord, Source};
use reqwest::header::HeaderMap;
use serde::Deserialize;

use crate::http::get_text;
use crate::source::{SourceAdapter, SourceError};

const VIES_URL: &str = "https://ec.europa.eu/taxation_customs/vies/rest-api/ms/PT/vat";

/// VIES's placeholder when a field is not disclosed.
const UNDISCLOSED: &str = "---";

pub struct EuropaAdapter {
    client: reqwest::Client,
    requester: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViesResponse {
    name: Option<String>,
    address: Option<String>,
    vat_number: Option<String>,
}

impl EuropaAdapter {
    pub fn new(client: reqwest::Client, requester: String) -> Self {
        Self { client, requester }
    }

    fn url(&self, nif: &Nif) -> String {
        format!(
            "{VIES_URL}/{nif}?requesterMemberStateCode=PT&requesterNumber={}",
            self.requester
        )
    }
}

#[async_trait]
impl SourceAdapter for EuropaAdapter {
    fn source(&self) -> Source {
        Source::Europa
    }

    async fn fetch(&self, nif: &Nif) -> Result<PartialRecord, SourceError> {
        let body = get_text(&self.client, &self.url(nif), HeaderMap::new()).await?;
        let resp: ViesResponse = serde_json::from_str(&body)?;
        Ok(resp.into_partial())
    }
}

impl ViesResponse {
    fn into_partial(self) -> PartialRecord {
        let lines: Vec<String> = self
            .address
            .as_deref()
            .map(|a| a.lines().map(|l| l.trim().to_string()).collect())
            .unwrap_or_default();
        let line = |i: usize| lines.get(i).cloned().and_then(disclosed);

        PartialRecord {
            name: self.name.and_then(disclosed),
            vat_id: self.vat_number.and_then(disclosed),
            address: Address {
                street_address: line(0),
                address_locality: line(1),
                postal_code: line(2),
                address_country: None,
            },
            ..PartialRecord::default()
        }
    }
}

fn disclosed(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty() && trimmed != UNDISCLOSED).then(|| trimmed.to_string())
}
