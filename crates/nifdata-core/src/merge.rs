//! Merge per-source partial records into one canonical record.
//!
//! Each output field has a fixed, source-ordered precedence list and takes
//! the first non-empty value it finds. The lists differ per field and are
//! part of the observable output; keep them as they are.
//!
//! | Field | Precedence |
//! |---|---|
//! | name, vatID, streetAddress, addressLocality, postalCode | Racius, Portugalio, Europa |
//! | legalName, taxID, addressCountry | Racius, Portugalio |
//! | description | Portugalio, Racius |
//!
//! `addressCountry` falls back to [`DEFAULT_COUNTRY`]. Source URLs are not
//! merged: each source's URL is kept in its own field.

use thiserror::Error;

use crate::record::{Address, CanonicalRecord, DEFAULT_COUNTRY, PartialRecord};

/// No source reported a name for the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no source returned a name")]
pub struct NotFound;

/// The upstream sources, in the order their results are passed to [`combine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Racius,
    Portugalio,
    Europa,
}

impl Source {
    pub fn name(self) -> &'static str {
        match self {
            Self::Racius => "racius",
            Self::Portugalio => "portugalio",
            Self::Europa => "europa",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Name,
    LegalName,
    TaxId,
    VatId,
    Description,
    StreetAddress,
    AddressLocality,
    PostalCode,
    AddressCountry,
}

impl Field {
    fn precedence(self) -> &'static [Source] {
        use Source::*;
        match self {
            Field::Name | Field::VatId => &[Racius, Portugalio, Europa],
            Field::StreetAddress | Field::AddressLocality | Field::PostalCode => {
                &[Racius, Portugalio, Europa]
            }
            Field::LegalName | Field::TaxId | Field::AddressCountry => &[Racius, Portugalio],
            Field::Description => &[Portugalio, Racius],
        }
    }

    fn extract(self, record: &PartialRecord) -> Option<&str> {
        let value = match self {
            Field::Name => &record.name,
            Field::LegalName => &record.legal_name,
            Field::TaxId => &record.tax_id,
            Field::VatId => &record.vat_id,
            Field::Description => &record.description,
            Field::StreetAddress => &record.address.street_address,
            Field::AddressLocality => &record.address.address_locality,
            Field::PostalCode => &record.address.postal_code,
            Field::AddressCountry => &record.address.address_country,
        };
        value.as_deref()
    }
}

struct Inputs<'a> {
    racius: &'a PartialRecord,
    portugalio: &'a PartialRecord,
    europa: &'a PartialRecord,
}

impl Inputs<'_> {
    fn get(&self, source: Source) -> &PartialRecord {
        match source {
            Source::Racius => self.racius,
            Source::Portugalio => self.portugalio,
            Source::Europa => self.europa,
        }
    }

    /// First non-empty value of `field`, walking its precedence list.
    fn resolve(&self, field: Field) -> Option<String> {
        field
            .precedence()
            .iter()
            .filter_map(|&source| field.extract(self.get(source)))
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Combine the three source results into a canonical record.
///
/// Total over any inputs, including all-empty ones. Fails with [`NotFound`]
/// only when no source supplied a non-empty name.
pub fn combine(
    racius: &PartialRecord,
    portugalio: &PartialRecord,
    europa: &PartialRecord,
) -> Result<CanonicalRecord, NotFound> {
    let inputs = Inputs {
        racius,
        portugalio,
        europa,
    };
    let name = inputs.resolve(Field::Name).ok_or(NotFound)?;

    Ok(CanonicalRecord {
        name,
        legal_name: inputs.resolve(Field::LegalName),
        tax_id: inputs.resolve(Field::TaxId),
        vat_id: inputs.resolve(Field::VatId),
        description: inputs.resolve(Field::Description),
        portugalio_url: portugalio.source_url.clone(),
        racius_url: racius.source_url.clone(),
        address: Address {
            street_address: inputs.resolve(Field::StreetAddress),
            address_locality: inputs.resolve(Field::AddressLocality),
            postal_code: inputs.resolve(Field::PostalCode),
            address_country: Some(
                inputs
                    .resolve(Field::AddressCountry)
                    .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            ),
        },
    })
}
