//! Candidate harvesting around an ISIN anchor.
//!
//! An ordered table of named pattern rules extracts provisional quantity,
//! price, and value tokens from the anchor window and from table rows keyed
//! by the anchor ISIN. Priority is data on the rule, not source order, so
//! rules can be added or reordered without touching control flow. Every
//! candidate carries its pattern id, span, locale hint, and distance from
//! the anchor; the reconciler does all arbitration.

use crate::locator::IsinAnchor;
use crate::normalizer::{detect_currency_in, normalize_with_locale};
use crate::schema::{LocaleHint, Table};
use crate::utils::window_around;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Quantity,
    Price,
    Value,
}

/// A provisional numeric extraction, not yet accepted as a resolved field.
///
/// `numeric_value` is always finite and non-negative; tokens that fail
/// normalization are dropped before this type is built.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub kind: CandidateKind,
    pub raw_text: String,
    pub numeric_value: f64,
    pub locale: LocaleHint,
    pub pattern_id: &'static str,
    pub priority: u8,
    pub distance_from_anchor: usize,
    pub currency: Option<String>,
    /// Document-coordinate span of the numeric token, for overlap dedup.
    pub span: (usize, usize),
}

#[derive(Debug, Clone, Default)]
pub struct HarvestedCandidates {
    pub quantities: Vec<RawCandidate>,
    pub prices: Vec<RawCandidate>,
    pub values: Vec<RawCandidate>,
    /// `Lot size: K` qualifier seen in the window. A multiplier for a
    /// harvested quantity, never a replacement quantity.
    pub lot_size: Option<f64>,
}

impl HarvestedCandidates {
    pub fn slot(&self, kind: CandidateKind) -> &[RawCandidate] {
        match kind {
            CandidateKind::Quantity => &self.quantities,
            CandidateKind::Price => &self.prices,
            CandidateKind::Value => &self.values,
        }
    }

    fn slot_mut(&mut self, kind: CandidateKind) -> &mut Vec<RawCandidate> {
        match kind {
            CandidateKind::Quantity => &mut self.quantities,
            CandidateKind::Price => &mut self.prices,
            CandidateKind::Value => &mut self.values,
        }
    }
}

struct PatternRule {
    id: &'static str,
    kind: CandidateKind,
    priority: u8,
    regex: Regex,
}

/// Numeric token: optional currency symbol, then digits with separators,
/// ending on a digit so sentence punctuation is not captured.
const NUM: &str = r"([$€£¥]?\s?\d(?:[\d.,]*\d)?)";

fn rule(id: &'static str, kind: CandidateKind, priority: u8, pattern: &str) -> PatternRule {
    PatternRule {
        id,
        kind,
        priority,
        regex: Regex::new(&pattern.replace("NUM", NUM)).expect("valid harvest pattern"),
    }
}

static RULES: Lazy<Vec<PatternRule>> = Lazy::new(|| {
    use CandidateKind::*;
    vec![
        // Family 1: explicit labels.
        rule("labeled:Quantity", Quantity, 1, r"(?i)\bquantity\s*:\s*NUM"),
        rule("labeled:Shares", Quantity, 1, r"(?i)\bshares\s*:\s*NUM"),
        rule("labeled:Holding", Quantity, 1, r"(?i)\bholdings?\s*:\s*NUM"),
        rule(
            "labeled:PricePerShare",
            Price,
            1,
            r"(?i)\bprice\s+per\s+(?:share|unit)\s*:\s*NUM",
        ),
        rule("labeled:MarketPrice", Price, 1, r"(?i)\bmarket\s+price\s*:\s*NUM"),
        rule("labeled:Price", Price, 1, r"(?i)\bprice\s*:\s*NUM"),
        rule("labeled:TotalValue", Value, 1, r"(?i)\btotal\s+value\s*:\s*NUM"),
        rule("labeled:MarketValue", Value, 1, r"(?i)\bmarket\s+value\s*:\s*NUM"),
        rule("labeled:Value", Value, 1, r"(?i)\bvalue\s*:\s*NUM"),
        rule("labeled:Total", Value, 1, r"(?i)\btotal\s*:\s*NUM"),
        // Family 2: parenthetical quantity.
        rule(
            "parenthetical:shares",
            Quantity,
            2,
            r"(?i)\(\s*NUM\s*(?:shares|units)\s*\)",
        ),
        // Family 3: bare number followed by a unit word, no colon label.
        rule("proximity:shares", Quantity, 3, r"(?i)NUM\s*(?:shares|units)\b"),
        // Family 4: narrative phrasing.
        rule(
            "narrative:holding",
            Quantity,
            4,
            r"(?i)\b(?:position\s+contains|holding\s+of|holds)\s+NUM",
        ),
        rule(
            "narrative:perShare",
            Price,
            4,
            r"(?i)(?:\bat|@)\s*NUM\s*(?:per\s+share|each)\b",
        ),
        rule(
            "narrative:valuedAt",
            Value,
            4,
            r"(?i)\b(?:valued\s+at|worth)\s+NUM",
        ),
    ]
});

static LOT_SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&r"(?i)\blot\s+size\s*:\s*NUM".replace("NUM", NUM)).expect("valid lot size pattern"));

const QUANTITY_HEADERS: [&str; 5] = ["quantity", "qty", "shares", "holding", "units"];
const PRICE_HEADERS: [&str; 4] = ["price", "market price", "unit price", "price per share"];
const VALUE_HEADERS: [&str; 5] = ["value", "market value", "total", "total value", "amount"];

/// Harvests quantity/price/value candidates for one anchor from its text
/// window and from any table row whose first cell is the anchor ISIN.
pub fn harvest(
    text: &str,
    anchor: &IsinAnchor,
    tables: &[Table],
    window_chars: usize,
    locale: Option<LocaleHint>,
) -> HarvestedCandidates {
    let (window, offset) = window_around(text, anchor.start, anchor.end, window_chars);
    let mut harvested = HarvestedCandidates::default();

    for rule in RULES.iter() {
        for caps in rule.regex.captures_iter(window) {
            let m = caps.get(1).expect("every harvest pattern captures a number");
            let span = (offset + m.start(), offset + m.end());

            if overlaps_existing(harvested.slot(rule.kind), span) {
                continue;
            }

            let normalized = match normalize_with_locale(m.as_str(), locale) {
                Ok(n) => n,
                Err(e) => {
                    debug!("Dropping candidate for {}: {}", rule.id, e);
                    continue;
                }
            };

            let currency = normalized
                .currency
                .clone()
                .or_else(|| currency_context(window, m.start(), m.end()));

            harvested.slot_mut(rule.kind).push(RawCandidate {
                kind: rule.kind,
                raw_text: m.as_str().to_string(),
                numeric_value: normalized.value,
                locale: normalized.locale,
                pattern_id: rule.id,
                priority: rule.priority,
                distance_from_anchor: distance(anchor, span),
                currency,
                span,
            });
        }
    }

    if let Some(caps) = LOT_SIZE_RE.captures(window) {
        let raw = caps.get(1).expect("lot size pattern captures a number");
        match normalize_with_locale(raw.as_str(), locale) {
            Ok(n) if n.value > 0.0 => harvested.lot_size = Some(n.value),
            Ok(_) => {}
            Err(e) => debug!("Dropping lot size qualifier: {}", e),
        }
    }

    harvest_table_rows(&mut harvested, anchor, tables, locale);

    harvested
}

/// Family 5: positional extraction from table rows, matched against
/// labeled column headers. Cells sit on the anchor row, so distance is 0.
fn harvest_table_rows(
    harvested: &mut HarvestedCandidates,
    anchor: &IsinAnchor,
    tables: &[Table],
    locale: Option<LocaleHint>,
) {
    for table in tables {
        let Some(header) = table.rows.first() else {
            continue;
        };

        for row in table.rows.iter().skip(1) {
            if row.first().map(|c| c.trim()) != Some(anchor.isin.as_str()) {
                continue;
            }

            for (col, cell) in row.iter().enumerate() {
                let Some(label) = header.get(col) else { break };
                let label = label.trim().to_lowercase();

                let (kind, id) = if QUANTITY_HEADERS.contains(&label.as_str()) {
                    (CandidateKind::Quantity, "table:Quantity")
                } else if PRICE_HEADERS.contains(&label.as_str()) {
                    (CandidateKind::Price, "table:Price")
                } else if VALUE_HEADERS.contains(&label.as_str()) {
                    (CandidateKind::Value, "table:Value")
                } else {
                    continue;
                };

                let normalized = match normalize_with_locale(cell, locale) {
                    Ok(n) => n,
                    Err(e) => {
                        debug!("Dropping table cell for {}: {}", id, e);
                        continue;
                    }
                };

                harvested.slot_mut(kind).push(RawCandidate {
                    kind,
                    raw_text: cell.trim().to_string(),
                    numeric_value: normalized.value,
                    locale: normalized.locale,
                    pattern_id: id,
                    priority: 5,
                    distance_from_anchor: 0,
                    currency: normalized.currency,
                    span: (anchor.start, anchor.end),
                });
            }
        }
    }
}

/// The same token often matches several rules (a labeled quantity is also a
/// proximity match). Rules run strongest-first, so the first claim on a
/// span wins.
fn overlaps_existing(existing: &[RawCandidate], span: (usize, usize)) -> bool {
    existing
        .iter()
        .any(|c| span.0 < c.span.1 && c.span.0 < span.1)
}

fn distance(anchor: &IsinAnchor, span: (usize, usize)) -> usize {
    if span.1 <= anchor.start {
        anchor.start - span.1
    } else if span.0 >= anchor.end {
        span.0 - anchor.end
    } else {
        0
    }
}

fn currency_context(window: &str, start: usize, end: usize) -> Option<String> {
    let before = &window[crate::utils::floor_char_boundary(window, start.saturating_sub(4))..start];
    let after_end = crate::utils::ceil_char_boundary(window, (end + 8).min(window.len()));
    let after = &window[end..after_end];
    detect_currency_in(after).or_else(|| detect_currency_in(before))
}
