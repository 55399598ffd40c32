//! Canonical decimal parsing for raw numeric tokens.
//!
//! OCR output mixes US (`35,045.00`) and European (`35.045,00`) number
//! styles, currency symbols, and unit suffixes. This module turns one raw
//! token into a canonical `f64` plus the locale/currency/unit hints the
//! later stages need. Unparsable tokens are a hard `ParseFailure` so the
//! caller can drop them; a bad token never becomes a zero.

use crate::error::{ExtractionError, Result};
use crate::schema::LocaleHint;

const CURRENCY_CODES: [&str; 10] = [
    "USD", "EUR", "GBP", "CHF", "JPY", "SEK", "NOK", "DKK", "CAD", "AUD",
];

const CURRENCY_SYMBOLS: [(char, &str); 4] = [('$', "USD"), ('€', "EUR"), ('£', "GBP"), ('¥', "JPY")];

const UNIT_WORDS: [&str; 6] = ["shares", "share", "units", "unit", "stk", "pcs"];

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedNumber {
    pub value: f64,
    pub locale: LocaleHint,
    pub currency: Option<String>,
    pub unit: Option<String>,
}

/// Normalizes a raw numeric token using per-token locale inference.
pub fn normalize_number(raw: &str) -> Result<NormalizedNumber> {
    normalize_with_locale(raw, None)
}

/// Normalizes a raw numeric token. When `locale` is given (document
/// metadata or caller knowledge) it overrides the separator heuristic.
pub fn normalize_with_locale(raw: &str, locale: Option<LocaleHint>) -> Result<NormalizedNumber> {
    let fail = || ExtractionError::ParseFailure(raw.to_string());

    let (stripped, currency_symbol) = strip_symbols(raw);

    let mut currency = currency_symbol;
    let mut unit = None;
    let mut numeric = String::new();

    for token in stripped.split_whitespace() {
        if let Some(code) = CURRENCY_CODES
            .iter()
            .find(|c| token.eq_ignore_ascii_case(c))
        {
            currency.get_or_insert_with(|| (*code).to_string());
        } else if let Some(word) = UNIT_WORDS.iter().find(|u| token.eq_ignore_ascii_case(u)) {
            unit.get_or_insert_with(|| (*word).to_string());
        } else {
            // OCR sometimes spaces out digits ("1 . 4 3 9 , 1 3");
            // concatenating the leftover tokens reassembles them.
            numeric.push_str(token);
        }
    }

    if numeric.is_empty() || !numeric.chars().any(|c| c.is_ascii_digit()) {
        return Err(fail());
    }
    if numeric.chars().any(|c| !c.is_ascii_digit() && c != '.' && c != ',') {
        return Err(fail());
    }

    let (canonical, inferred) = match locale {
        Some(LocaleHint::Us) => (forced_locale(&numeric, '.', ','), LocaleHint::Us),
        Some(LocaleHint::European) => (forced_locale(&numeric, ',', '.'), LocaleHint::European),
        _ => disambiguate(&numeric),
    };

    let value: f64 = canonical.parse().map_err(|_| fail())?;
    if !value.is_finite() || value < 0.0 {
        return Err(fail());
    }

    Ok(NormalizedNumber {
        value,
        locale: inferred,
        currency,
        unit,
    })
}

/// Currency symbol/code scan over a small context slice, used by the
/// harvester to attach hints from text adjacent to a matched number.
pub(crate) fn detect_currency_in(context: &str) -> Option<String> {
    for c in context.chars() {
        if let Some((_, code)) = CURRENCY_SYMBOLS.iter().find(|(sym, _)| *sym == c) {
            return Some((*code).to_string());
        }
    }
    context
        .split(|c: char| !c.is_ascii_alphabetic())
        .find_map(|word| {
            CURRENCY_CODES
                .iter()
                .find(|code| word.eq_ignore_ascii_case(code))
                .map(|code| (*code).to_string())
        })
}

fn strip_symbols(raw: &str) -> (String, Option<String>) {
    let mut currency = None;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if let Some((_, code)) = CURRENCY_SYMBOLS.iter().find(|(sym, _)| *sym == c) {
            currency.get_or_insert_with(|| (*code).to_string());
            // Separate surrounding text so "£1,000" still tokenizes.
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    (out, currency)
}

/// Rewrites `numeric` under a known locale: `decimal_sep` is kept as the
/// decimal point, `thousands_sep` occurrences are stripped. A decimal
/// separator appearing more than once is treated as grouping noise.
fn forced_locale(numeric: &str, decimal_sep: char, thousands_sep: char) -> String {
    let stripped: String = numeric.chars().filter(|c| *c != thousands_sep).collect();
    if stripped.matches(decimal_sep).count() == 1 {
        stripped.replace(decimal_sep, ".")
    } else {
        stripped.chars().filter(|c| *c != decimal_sep).collect()
    }
}

/// Separator disambiguation for tokens with no external locale knowledge.
///
/// Both separators present: the last-occurring one is the decimal point.
/// A single separator is a decimal point when 1-2 digits follow it, and a
/// thousands separator only when the digits group in exact threes; anything
/// else (e.g. `0.5375`) reads as a decimal.
fn disambiguate(numeric: &str) -> (String, LocaleHint) {
    let last_dot = numeric.rfind('.');
    let last_comma = numeric.rfind(',');

    match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            if d > c {
                (numeric.replace(',', ""), LocaleHint::Us)
            } else {
                (numeric.replace('.', "").replace(',', "."), LocaleHint::European)
            }
        }
        (Some(_), None) => single_separator(numeric, '.', LocaleHint::Us, LocaleHint::European),
        (None, Some(_)) => single_separator(numeric, ',', LocaleHint::European, LocaleHint::Us),
        (None, None) => (numeric.to_string(), LocaleHint::Unknown),
    }
}

fn single_separator(
    numeric: &str,
    sep: char,
    decimal_locale: LocaleHint,
    thousands_locale: LocaleHint,
) -> (String, LocaleHint) {
    let occurrences = numeric.matches(sep).count();
    let tail_len = numeric
        .rsplit(sep)
        .next()
        .map(|tail| tail.len())
        .unwrap_or(0);

    let is_decimal = occurrences == 1 && (1..=2).contains(&tail_len);
    if is_decimal {
        return (numeric.replace(sep, "."), decimal_locale);
    }

    if is_valid_grouping(numeric, sep) {
        return (numeric.replace(sep, ""), thousands_locale);
    }

    // Not a plausible thousands grouping; a lone separator with a long
    // tail (e.g. "0.5375") still reads as a decimal point.
    if occurrences == 1 {
        (numeric.replace(sep, "."), decimal_locale)
    } else {
        (numeric.replace(sep, ""), thousands_locale)
    }
}

/// Thousands grouping requires a 1-3 digit head and exact 3-digit groups.
fn is_valid_grouping(numeric: &str, sep: char) -> bool {
    let mut groups = numeric.split(sep);
    let head = groups.next().unwrap_or("");
    if head.is_empty() || head.len() > 3 {
        return false;
    }
    groups.count() > 0 && numeric.split(sep).skip(1).all(|g| g.len() == 3)
}
