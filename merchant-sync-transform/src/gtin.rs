//! Barcode → GTIN normalisation.
//!
//! Odoo barcodes are free text. Merchant Center only accepts GTIN-8/12/13/14,
//! so anything else is either upgraded (11-digit internal codes) or dropped.

use tracing::{debug, warn};

/// Lengths Merchant Center accepts verbatim.
const ACCEPTED_LENGTHS: [usize; 4] = [8, 12, 13, 14];

/// Internal 11-digit codes keep only their last 10 digits behind the prefix.
const INTERNAL_CODE_LENGTH: usize = 11;

/// Normalise `raw` into a GTIN, or `None` when it cannot be one.
///
/// `prefix` is the 3-digit company prefix used to lift 11-digit internal
/// codes to GTIN-14.
pub fn normalize_gtin(raw: &str, prefix: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.bytes().all(|b| b == b'0') {
        return None;
    }

    match digits.len() {
        n if ACCEPTED_LENGTHS.contains(&n) => Some(digits),
        INTERNAL_CODE_LENGTH => {
            let body = format!("{prefix}{}", &digits[1..]);
            let gtin = format!("{body}{}", gs1_check_digit(&body));
            debug!("barcode {raw:?} lifted to GTIN-14 {gtin}");
            Some(gtin)
        }
        n => {
            warn!("barcode {raw:?} ignored: {n} digits is not a GTIN length");
            None
        }
    }
}

/// GS1 mod-10 check digit for `body` (all digits except the check digit).
///
/// Weights alternate 3,1,3,… starting from the rightmost digit. Non-digit
/// characters are skipped.
pub fn gs1_check_digit(body: &str) -> u32 {
    let total: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { d })
        .sum();
    (10 - total % 10) % 10
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
