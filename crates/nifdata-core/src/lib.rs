pub mod merge;
pub mod nif;
pub mod record;

pub use merge::{NotFound, Source, combine};
pub use nif::{InvalidNif, Nif, check_digit, is_valid};
pub use record::{Address, CanonicalRecord, DEFAULT_COUNTRY, PartialRecord};
