//! Schema.org `Organization` blocks as embedded by the scraped directory sites.

use nifdata_core::{Address, PartialRecord};
use serde::Deserialize;

/// A string that some pages emit as a JSON number (`"taxID": 503709735`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Text {
    Str(String),
    Num(serde_json::Number),
}

impl From<Text> for String {
    fn from(text: Text) -> Self {
        match text {
            Text::Str(s) => s,
            Text::Num(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn first(self) -> Option<String> {
        match self {
            Self::One(s) => Some(s),
            Self::Many(v) => v.into_iter().next(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LdAddress {
    street_address: Option<Text>,
    address_locality: Option<Text>,
    postal_code: Option<Text>,
    address_country: Option<Text>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LdOrganization {
    name: Option<Text>,
    legal_name: Option<Text>,
    #[serde(rename = "taxID")]
    tax_id: Option<Text>,
    #[serde(rename = "vatID")]
    vat_id: Option<Text>,
    description: Option<Text>,
    url: Option<OneOrMany>,
    #[serde(default)]
    address: Option<LdAddress>,
}

impl LdOrganization {
    pub(crate) fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Convert to a partial record, using `fallback_url` when the block has
    /// no `url` of its own.
    pub(crate) fn into_partial(self, fallback_url: Option<String>) -> PartialRecord {
        let address = self.address.unwrap_or_default();
        PartialRecord {
            name: self.name.map(String::from),
            legal_name: self.legal_name.map(String::from),
            tax_id: self.tax_id.map(String::from),
            vat_id: self.vat_id.map(String::from),
            description: self.description.map(String::from),
            source_url: self.url.and_then(OneOrMany::first).or(fallback_url),
            address: Address {
                street_address: address.street_address.map(String::from),
                address_locality: address.address_locality.map(String::from),
                postal_code: address.postal_code.map(String::from),
                address_country: address.address_country.map(String::from),
            },
        }
    }
}
