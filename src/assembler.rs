//! Final packaging of one anchor's resolution into a `SecurityRecord`.

use crate::locator::IsinAnchor;
use crate::normalizer::detect_currency_in;
use crate::reconciler::{Reconciliation, ResolvedField};
use crate::schema::{Provenance, SecurityRecord};
use crate::utils::{is_title_cased, window_around};
use log::debug;

/// Builds the immutable output record for one anchor.
pub fn assemble(
    text: &str,
    anchor: &IsinAnchor,
    reconciliation: Reconciliation,
    window_chars: usize,
) -> SecurityRecord {
    let (window, _) = window_around(text, anchor.start, anchor.end, window_chars);

    let name = guess_name(window, &anchor.isin)
        .unwrap_or_else(|| format!("Security with ISIN {}", anchor.isin));

    let currency = field_currency(&reconciliation.value)
        .or_else(|| field_currency(&reconciliation.price))
        .or_else(|| field_currency(&reconciliation.quantity))
        .or_else(|| detect_currency_in(window));

    debug!(
        "Assembled record for {}: name={:?}, confidence={:?}",
        anchor.isin, name, reconciliation.confidence
    );

    SecurityRecord {
        isin: anchor.isin.clone(),
        name,
        quantity: reconciliation.quantity.as_ref().map(|f| f.value),
        price: reconciliation.price.as_ref().map(|f| f.value),
        value: reconciliation.value.as_ref().map(|f| f.value),
        currency,
        confidence: reconciliation.confidence,
        provenance: Provenance {
            quantity: reconciliation.quantity.map(|f| f.provenance),
            price: reconciliation.price.map(|f| f.provenance),
            value: reconciliation.value.map(|f| f.provenance),
        },
        warnings: reconciliation.warnings,
    }
}

/// First plausible title-cased line in the window. Label lines and numeric
/// lines are never names; an ISIN sharing the line with the name is
/// stripped before the title-case test.
fn guess_name(window: &str, isin: &str) -> Option<String> {
    for line in window.lines() {
        let without_isin = line.replace(isin, " ");
        let trimmed = without_isin.trim();

        if trimmed.is_empty() || looks_like_label_line(trimmed) {
            continue;
        }

        let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        if digits * 3 > trimmed.len() {
            continue;
        }

        if is_title_cased(trimmed) {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// Colon-labeled lines are field lines (`Quantity: 100`), and any line
/// still mentioning an ISIN keyword is identification, not a name.
fn looks_like_label_line(line: &str) -> bool {
    line.contains(':') || line.to_lowercase().contains("isin")
}

fn field_currency(field: &Option<ResolvedField>) -> Option<String> {
    field.as_ref().and_then(|f| f.currency.clone())
}
