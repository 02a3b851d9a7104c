//! Invoice number formatting.
//!
//! ```text
//! INV-20261018-0042          base number, 42nd sale of the day
//! INV-20261018-0042-7QX2     after a collision, random suffix appended
//! ```
//!
//! The sequence value and the random suffix are supplied by the caller;
//! this module only formats.

use chrono::NaiveDate;

pub const DEFAULT_INVOICE_PREFIX: &str = "INV";

/// Alphabet for collision suffixes.
pub const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a collision suffix.
pub const SUFFIX_LEN: usize = 4;

/// Key of the per-day counter row: `YYYYMMDD`.
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// `PREFIX-YYYYMMDD-NNNN`, sequence zero-padded to four digits.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use retail_core::numbering::format_invoice_number;
///
/// let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
/// assert_eq!(format_invoice_number("INV", day, 7), "INV-20261018-0007");
/// ```
pub fn format_invoice_number(prefix: &str, date: NaiveDate, sequence: i64) -> String {
    format!("{}-{}-{:04}", prefix, day_key(date), sequence)
}

/// Appends a collision suffix to a base invoice number.
pub fn with_suffix(base: &str, suffix: &str) -> String {
    format!("{}-{}", base, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_padding() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(format_invoice_number("INV", day, 1), "INV-20260105-0001");
        assert_eq!(format_invoice_number("POS", day, 12345), "POS-20260105-12345");
    }

    #[test]
    fn test_suffix() {
        assert_eq!(
            with_suffix("INV-20260105-0001", "AB12"),
            "INV-20260105-0001-AB12"
        );
    }
}
