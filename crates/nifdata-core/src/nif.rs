//! Portuguese tax identifiers (NIF).
//!
//! A NIF is nine decimal digits. The leading digit (or two) encodes the kind
//! of taxpayer and the ninth digit is a mod-11 check digit over the first
//! eight.
//!
//! # Prefixes
//!
//! - Single digit: 1, 2, 3 (individuals), 5 (companies), 6 (public bodies),
//!   8 (sole traders)
//! - Two digits: 45 (non-residents), 70, 71, 72, 77, 79 (estates, funds,
//!   VAT groups), 90, 91 (condominiums, irregular entities), 98 (non-residents
//!   without a permanent establishment)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const NIF_LEN: usize = 9;

const VALID_PREFIXES: &[&str] = &[
    "1", "2", "3", "5", "6", "8", "45", "70", "71", "72", "77", "79", "90", "91", "98",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidNif {
    #[error("NIF must be exactly 9 ASCII digits, got {0:?}")]
    Format(String),

    #[error("NIF {0} does not start with a known taxpayer prefix")]
    Prefix(String),

    #[error("NIF {0} fails its check digit")]
    CheckDigit(String),
}

/// A nine-digit tax identifier.
///
/// Construction through [`parse`](Self::parse) only guarantees the shape
/// (nine ASCII digits), which is all the storage layer needs to derive a
/// sharded path. Use [`checked`](Self::checked) at the system boundary to
/// also enforce the prefix whitelist and check digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nif(String);

impl Nif {
    /// Accept any string of exactly nine ASCII digits.
    pub fn parse(s: &str) -> Result<Self, InvalidNif> {
        if s.len() != NIF_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidNif::Format(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Parse and fully validate: shape, prefix, and check digit.
    pub fn checked(s: &str) -> Result<Self, InvalidNif> {
        let nif = Self::parse(s)?;
        if !has_known_prefix(&nif.0) {
            return Err(InvalidNif::Prefix(nif.0));
        }
        if check_digit(&nif.0) != Some(nif.digit(8)) {
            return Err(InvalidNif::CheckDigit(nif.0));
        }
        Ok(nif)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into the three storage segments: digits 1-3, 4-6, and 7-9.
    pub fn segments(&self) -> [&str; 3] {
        [&self.0[..3], &self.0[3..6], &self.0[6..]]
    }

    fn digit(&self, i: usize) -> u32 {
        u32::from(self.0.as_bytes()[i] - b'0')
    }
}

impl FromStr for Nif {
    type Err = InvalidNif;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::checked(s)
    }
}

impl TryFrom<String> for Nif {
    type Error = InvalidNif;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Nif> for String {
    fn from(nif: Nif) -> Self {
        nif.0
    }
}

impl AsRef<str> for Nif {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether `s` is a well-formed NIF with a known prefix and a matching check digit.
pub fn is_valid(s: &str) -> bool {
    Nif::checked(s).is_ok()
}

/// Compute the expected ninth digit from the first eight.
///
/// # Algorithm
///
/// 1. Weighted sum of digits 1-8 with weights 9, 8, ..., 2
/// 2. Take the sum modulo 11
/// 3. A remainder of 0 or 1 gives check digit 0, otherwise `11 - remainder`
///
/// Returns `None` when `s` has fewer than eight leading ASCII digits.
pub fn check_digit(s: &str) -> Option<u32> {
    let body = s.as_bytes().get(..8)?;
    if !body.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let sum: u32 = body
        .iter()
        .zip((2..=9).rev())
        .map(|(b, weight)| u32::from(b - b'0') * weight)
        .sum();
    Some(match sum % 11 {
        0 | 1 => 0,
        m => 11 - m,
    })
}

fn has_known_prefix(s: &str) -> bool {
    VALID_PREFIXES.iter().any(|p| s.starts_with(p))
}
