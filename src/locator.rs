//! ISIN anchor detection.
//!
//! An anchor is the text position of an ISIN-shaped token (2 uppercase
//! letters, 9 uppercase alphanumerics, 1 check digit). Matching is
//! syntactic; the ISO 6166 checksum is available as an opt-in filter.

use once_cell::sync::Lazy;
use regex::Regex;

static ISIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z]{2}[A-Z0-9]{9}[0-9])\b").expect("valid ISIN regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsinAnchor {
    pub isin: String,
    pub start: usize,
    pub end: usize,
}

/// Scans the document for ISIN-shaped tokens, ordered by offset.
///
/// The same ISIN appearing at several offsets yields one anchor each;
/// merging duplicates is a reconciliation-level decision, not a matching
/// one.
pub fn locate_isins(text: &str) -> Vec<IsinAnchor> {
    ISIN_RE
        .find_iter(text)
        .map(|m| IsinAnchor {
            isin: m.as_str().to_string(),
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// ISO 6166 check digit validation (mod-10 double-add-double).
///
/// Letters expand to two digits (A=10 .. Z=35) before the Luhn pass.
pub fn isin_checksum_valid(isin: &str) -> bool {
    if isin.len() != 12 {
        return false;
    }

    let mut digits: Vec<u32> = Vec::with_capacity(24);
    for c in isin.chars() {
        if let Some(d) = c.to_digit(10) {
            digits.push(d);
        } else if c.is_ascii_uppercase() {
            let v = c as u32 - 'A' as u32 + 10;
            digits.push(v / 10);
            digits.push(v % 10);
        } else {
            return false;
        }
    }

    let mut sum = 0;
    for (i, d) in digits.iter().rev().enumerate() {
        let mut d = *d;
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}
