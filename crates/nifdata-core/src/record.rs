//! Business record types: per-source partial records and the merged canonical record.

use serde::{Deserialize, Serialize};

/// Country recorded when no source reports one.
pub const DEFAULT_COUNTRY: &str = "PORTUGAL";

/// Postal address. Every field is optional because every source is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_country: Option<String>,
}

/// What a single source managed to extract for one NIF.
///
/// Built fresh per lookup attempt. A source that fails contributes
/// [`PartialRecord::default()`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub tax_id: Option<String>,
    pub vat_id: Option<String>,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub address: Address,
}

impl PartialRecord {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The merged record persisted per NIF.
///
/// Field names on the wire are stable: `name`, `legalName`, `taxID`, `vatID`,
/// `description`, `portugalioURL`, `raciusURL`, and `address` with
/// `streetAddress`, `addressLocality`, `postalCode`, `addressCountry`.
/// Absent optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub name: String,
    #[serde(rename = "legalName", default, skip_serializing_if = "Option::is_none")]
    pub legal_name: Option<String>,
    #[serde(rename = "taxID", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(rename = "vatID", default, skip_serializing_if = "Option::is_none")]
    pub vat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "portugalioURL", default, skip_serializing_if = "Option::is_none")]
    pub portugalio_url: Option<String>,
    #[serde(rename = "raciusURL", default, skip_serializing_if = "Option::is_none")]
    pub racius_url: Option<String>,
    #[serde(default)]
    pub address: Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CanonicalRecord {
        CanonicalRecord {
            name: "Foo Lda".into(),
            legal_name: Some("Foo, Limitada".into()),
            tax_id: Some("503709735".into()),
            vat_id: Some("PT503709735".into()),
            description: None,
            portugalio_url: Some("https://www.portugalio.com/foo/".into()),
            racius_url: None,
            address: Address {
                postal_code: Some("1000-001".into()),
                address_country: Some(DEFAULT_COUNTRY.into()),
                ..Address::default()
            },
        }
    }

    #[test]
    fn canonical_record_wire_names() {
        let json: serde_json::Value = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["name"], "Foo Lda");
        assert_eq!(json["legalName"], "Foo, Limitada");
        assert_eq!(json["taxID"], "503709735");
        assert_eq!(json["vatID"], "PT503709735");
        assert_eq!(json["portugalioURL"], "https://www.portugalio.com/foo/");
        assert_eq!(json["address"]["postalCode"], "1000-001");
        assert_eq!(json["address"]["addressCountry"], "PORTUGAL");
        assert!(json.get("description").is_none());
        assert!(json.get("raciusURL").is_none());
        assert!(json["address"].get("streetAddress").is_none());
    }

    #[test]
    fn canonical_record_json_roundtrip() {
        let record = sample();
        let bytes = serde_json::to_vec(&record).unwrap();
        let parsed: CanonicalRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(serde_json::to_vec(&parsed).unwrap(), bytes);
    }

    #[test]
    fn missing_name_does_not_deserialize() {
        let json = r#"{"legalName": "Nameless", "address": {}}"#;
        assert!(serde_json::from_str::<CanonicalRecord>(json).is_err());
    }

    #[test]
    fn default_partial_is_empty() {
        assert!(PartialRecord::default().is_empty());
        let named = PartialRecord {
            name: Some("x".into()),
            ..PartialRecord::default()
        };
        assert!(!named.is_empty());
    }
}
