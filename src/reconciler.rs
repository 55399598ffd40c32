//! Three-slot reconciliation of harvested candidates.
//!
//! Each of quantity, price, and value moves independently from a candidate
//! set to a resolved figure. The arbiter is the arithmetic invariant
//! `price x quantity = value` within a relative tolerance: a ranked search
//! over candidate combinations (including lot-size adjusted quantities)
//! looks for a consistent triple first; arithmetic completion fills a
//! missing third slot; a harvested candidate that conflicts with the
//! computed figure beyond the tolerance is discarded, not averaged.
//! Ambiguity and overrides surface as warnings and a lower confidence,
//! never as errors.

use crate::harvester::{HarvestedCandidates, RawCandidate};
use crate::schema::Confidence;
use log::debug;

/// How a resolved figure was produced, recorded for provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionMethod {
    /// Taken from a harvested candidate as-is.
    Direct,
    /// Derived arithmetically from the other two slots.
    Computed,
    /// Harvested quantity multiplied by a lot-size qualifier.
    LotAdjusted,
}

#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub value: f64,
    pub provenance: String,
    pub method: ResolutionMethod,
    pub currency: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub quantity: Option<ResolvedField>,
    pub price: Option<ResolvedField>,
    pub value: Option<ResolvedField>,
    pub confidence: Confidence,
    pub warnings: Vec<String>,
}

/// Candidates per slot considered by the combination search. Slots rarely
/// hold more than a handful of candidates; the cap keeps the search bounded.
const MAX_RANKED: usize = 8;

pub fn reconcile(harvested: &HarvestedCandidates, tolerance: f64) -> Reconciliation {
    let quantities = ranked(&harvested.quantities);
    let prices = ranked(&harvested.prices);
    let values = ranked(&harvested.values);

    match (
        !quantities.is_empty(),
        !prices.is_empty(),
        !values.is_empty(),
    ) {
        (true, true, true) => {
            reconcile_full(&quantities, &prices, &values, harvested.lot_size, tolerance)
        }
        (true, true, false) => complete_third(
            Slot::Value,
            direct(quantities[0]),
            direct(prices[0]),
            ambiguity(&[&quantities, &prices]),
        ),
        (false, true, true) => complete_third(
            Slot::Quantity,
            direct(prices[0]),
            direct(values[0]),
            ambiguity(&[&prices, &values]),
        ),
        (true, false, true) => complete_third(
            Slot::Price,
            direct(quantities[0]),
            direct(values[0]),
            ambiguity(&[&quantities, &values]),
        ),
        _ => resolve_partial(&quantities, &prices, &values),
    }
}

/// Candidate ranking: pattern priority first, then proximity to the anchor.
/// Invariant agreement, the third ranking input, is applied by the
/// combination search in `reconcile_full`.
fn ranked(candidates: &[RawCandidate]) -> Vec<&RawCandidate> {
    let mut sorted: Vec<&RawCandidate> = candidates.iter().collect();
    sorted.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then(a.distance_from_anchor.cmp(&b.distance_from_anchor))
    });
    sorted.truncate(MAX_RANKED);
    sorted
}

/// All three slots harvested something: search combinations in ranked
/// order for an invariant-consistent triple, trying each quantity bare
/// before lot-adjusted. Falls back to discrepancy resolution when nothing
/// agrees.
fn reconcile_full(
    quantities: &[&RawCandidate],
    prices: &[&RawCandidate],
    values: &[&RawCandidate],
    lot_size: Option<f64>,
    tolerance: f64,
) -> Reconciliation {
    for q in quantities {
        for (lot_adjusted, qty) in quantity_variants(q, lot_size) {
            for p in prices {
                for v in values {
                    if relative_error(p.numeric_value * qty, v.numeric_value) <= tolerance {
                        debug!(
                            "Invariant satisfied: {} x {} = {} ({}, {}, {})",
                            qty, p.numeric_value, v.numeric_value, q.pattern_id, p.pattern_id, v.pattern_id
                        );
                        let quantity = if lot_adjusted {
                            ResolvedField {
                                value: qty,
                                provenance: format!("lot-adjusted:{}", q.pattern_id),
                                method: ResolutionMethod::LotAdjusted,
                                currency: q.currency.clone(),
                            }
                        } else {
                            direct(q)
                        };
                        return Reconciliation {
                            quantity: Some(quantity),
                            price: Some(direct(p)),
                            value: Some(direct(v)),
                            confidence: Confidence::High,
                            warnings: Vec::new(),
                        };
                    }
                }
            }
        }
    }

    discrepancy_resolution(quantities[0], prices[0], values[0], tolerance)
}

/// No combination satisfies the invariant. Price and value are treated as
/// authoritative and the quantity is recomputed; the harvested quantity is
/// discarded when it disagrees beyond the tolerance.
fn discrepancy_resolution(
    q: &RawCandidate,
    p: &RawCandidate,
    v: &RawCandidate,
    tolerance: f64,
) -> Reconciliation {
    if p.numeric_value == 0.0 {
        let mut rec = best_effort(Some(q), Some(p), Some(v));
        rec.warnings
            .push("Invariant unsatisfiable and price is zero; emitting harvested candidates unchecked".to_string());
        return rec;
    }

    let computed = v.numeric_value / p.numeric_value;
    let mut warnings = Vec::new();

    let quantity = if relative_error(computed, q.numeric_value) <= tolerance {
        direct(q)
    } else {
        warnings.push(format!(
            "Harvested quantity {} ({}) disagrees with value/price = {}; using the computed figure",
            q.numeric_value, q.pattern_id, computed
        ));
        ResolvedField {
            value: computed,
            provenance: "computed:value/price".to_string(),
            method: ResolutionMethod::Computed,
            currency: None,
        }
    };

    Reconciliation {
        quantity: Some(quantity),
        price: Some(direct(p)),
        value: Some(direct(v)),
        confidence: Confidence::Medium,
        warnings,
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Quantity,
    Price,
    Value,
}

/// Exactly two slots resolvable: compute the third. The computed figure is
/// consistent by construction, so confidence stays High unless ranking had
/// to arbitrate between competing candidates.
fn complete_third(
    missing: Slot,
    first: ResolvedField,
    second: ResolvedField,
    ambiguous: Option<String>,
) -> Reconciliation {
    let computed = |value: f64, formula: &str| ResolvedField {
        value,
        provenance: format!("computed:{}", formula),
        method: ResolutionMethod::Computed,
        currency: None,
    };

    let (quantity, price, value, failure) = match missing {
        Slot::Value => {
            let v = computed(first.value * second.value, "price*quantity");
            (Some(first), Some(second), Some(v), None)
        }
        Slot::Quantity => {
            if first.value == 0.0 {
                (None, Some(first), Some(second), Some("quantity"))
            } else {
                let q = computed(second.value / first.value, "value/price");
                (Some(q), Some(first), Some(second), None)
            }
        }
        Slot::Price => {
            if first.value == 0.0 {
                (Some(first), None, Some(second), Some("price"))
            } else {
                let p = computed(second.value / first.value, "value/quantity");
                (Some(first), Some(p), Some(second), None)
            }
        }
    };

    let mut warnings = Vec::new();
    let mut confidence = Confidence::High;

    if let Some(field) = failure {
        warnings.push(format!(
            "Cannot compute {}: the known divisor is zero",
            field
        ));
        confidence = Confidence::Low;
    }
    if let Some(reason) = ambiguous {
        warnings.push(reason);
        confidence = confidence.min(Confidence::Medium);
    }

    Reconciliation {
        quantity,
        price,
        value,
        confidence,
        warnings,
    }
}

/// Zero or one slots harvested: emit what exists, nothing to cross-check.
fn resolve_partial(
    quantities: &[&RawCandidate],
    prices: &[&RawCandidate],
    values: &[&RawCandidate],
) -> Reconciliation {
    let mut rec = best_effort(
        quantities.first().copied(),
        prices.first().copied(),
        values.first().copied(),
    );

    let filled = [quantities, prices, values]
        .iter()
        .filter(|s| !s.is_empty())
        .count();

    if filled == 0 {
        rec.warnings
            .push("No numeric candidates found near anchor".to_string());
        return rec;
    }

    let unambiguous = [quantities, prices, values]
        .iter()
        .all(|s| s.len() <= 1);

    if unambiguous {
        rec.confidence = Confidence::Medium;
    } else {
        rec.warnings
            .push("Multiple candidates with no invariant support; ranked fallback".to_string());
    }
    rec
}

/// Best single harvested candidate per slot at Low confidence.
fn best_effort(
    q: Option<&RawCandidate>,
    p: Option<&RawCandidate>,
    v: Option<&RawCandidate>,
) -> Reconciliation {
    Reconciliation {
        quantity: q.map(direct),
        price: p.map(direct),
        value: v.map(direct),
        confidence: Confidence::Low,
        warnings: Vec::new(),
    }
}

fn direct(candidate: &RawCandidate) -> ResolvedField {
    ResolvedField {
        value: candidate.numeric_value,
        provenance: candidate.pattern_id.to_string(),
        method: ResolutionMethod::Direct,
        currency: candidate.currency.clone(),
    }
}

fn quantity_variants(q: &RawCandidate, lot_size: Option<f64>) -> Vec<(bool, f64)> {
    let mut variants = vec![(false, q.numeric_value)];
    if let Some(k) = lot_size {
        variants.push((true, q.numeric_value * k));
    }
    variants
}

fn ambiguity(slots: &[&Vec<&RawCandidate>]) -> Option<String> {
    let contested: Vec<&str> = slots
        .iter()
        .filter(|s| s.len() > 1)
        .map(|s| s[0].pattern_id)
        .collect();
    if contested.is_empty() {
        None
    } else {
        Some(format!(
            "Competing candidates resolved by rank (winner: {})",
            contested.join(", ")
        ))
    }
}

fn relative_error(product: f64, value: f64) -> f64 {
    if value == 0.0 {
        if product == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (product - value).abs() / value.abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvester::{CandidateKind, HarvestedCandidates};
    use crate::schema::LocaleHint;

    fn candidate(
        kind: CandidateKind,
        value: f64,
        pattern_id: &'static str,
        priority: u8,
        distance: usize,
    ) -> RawCandidate {
        RawCandidate {
            kind,
            raw_text: value.to_string(),
            numeric_value: value,
            locale: LocaleHint::Unknown,
            pattern_id,
            priority,
            distance_from_anchor: distance,
            currency: None,
            span: (0, 0),
        }
    }

    fn harvested(q: &[f64], p: &[f64], v: &[f64]) -> HarvestedCandidates {
        HarvestedCandidates {
            quantities: q
                .iter()
                .map(|x| candidate(CandidateKind::Quantity, *x, "labeled:Quantity", 1, 10))
                .collect(),
            prices: p
                .iter()
                .map(|x| candidate(CandidateKind::Price, *x, "labeled:Price", 1, 20))
                .collect(),
            values: v
                .iter()
                .map(|x| candidate(CandidateKind::Value, *x, "labeled:Value", 1, 30))
                .collect(),
            lot_size: None,
        }
    }

    #[test]
    fn test_consistent_triple_is_high_confidence() {
        let rec = reconcile(&harvested(&[100.0], &[350.45], &[35045.0]), 0.01);
        assert_eq!(rec.quantity.as_ref().unwrap().value, 100.0);
        assert_eq!(rec.confidence, Confidence::High);
        assert_eq!(
            rec.quantity.unwrap().method,
            ResolutionMethod::Direct
        );
        assert!(rec.warnings.is_empty());
    }

    #[test]
    fn test_two_slots_compute_the_third() {
        let rec = reconcile(&harvested(&[], &[125.78], &[25156.0]), 0.01);
        let q = rec.quantity.unwrap();
        assert!((q.value - 200.0).abs() < 1e-9);
        assert_eq!(q.method, ResolutionMethod::Computed);
        assert_eq!(q.provenance, "computed:value/price");
        assert_eq!(rec.confidence, Confidence::High);
    }

    #[test]
    fn test_quantity_and_price_compute_value() {
        let rec = reconcile(&harvested(&[100.0], &[350.45], &[]), 0.01);
        let v = rec.value.unwrap();
        assert!((v.value - 35045.0).abs() < 1e-9);
        assert_eq!(v.provenance, "computed:price*quantity");
    }

    #[test]
    fn test_discrepancy_overrides_harvested_quantity() {
        let rec = reconcile(&harvested(&[50.0], &[220.0], &[22000.0]), 0.01);
        let q = rec.quantity.unwrap();
        assert!((q.value - 100.0).abs() < 1e-9);
        assert_eq!(q.method, ResolutionMethod::Computed);
        assert_eq!(rec.confidence, Confidence::Medium);
        assert!(!rec.warnings.is_empty());
    }

    #[test]
    fn test_competing_candidates_pick_invariant_consistent_one() {
        let mut h = harvested(&[50.0], &[220.0], &[22000.0]);
        h.quantities.push(candidate(
            CandidateKind::Quantity,
            100.0,
            "narrative:holding",
            4,
            50,
        ));
        let rec = reconcile(&h, 0.01);
        let q = rec.quantity.unwrap();
        // The weaker-pattern candidate agrees with value/price and wins.
        assert_eq!(q.value, 100.0);
        assert_eq!(q.provenance, "narrative:holding");
        assert_eq!(rec.confidence, Confidence::High);
    }

    #[test]
    fn test_lot_size_adjustment() {
        let mut h = harvested(&[25.0], &[420.55], &[1_051_375.0]);
        h.lot_size = Some(100.0);
        let rec = reconcile(&h, 0.01);
        let q = rec.quantity.unwrap();
        assert_eq!(q.value, 2500.0);
        assert_eq!(q.method, ResolutionMethod::LotAdjusted);
        assert_eq!(q.provenance, "lot-adjusted:labeled:Quantity");
        assert_eq!(rec.confidence, Confidence::High);
    }

    #[test]
    fn test_bare_quantity_preferred_over_lot_adjusted() {
        let mut h = harvested(&[100.0], &[350.45], &[35045.0]);
        h.lot_size = Some(10.0);
        let rec = reconcile(&h, 0.01);
        assert_eq!(rec.quantity.unwrap().method, ResolutionMethod::Direct);
    }

    #[test]
    fn test_single_slot_is_medium_confidence() {
        let rec = reconcile(&harvested(&[100.0], &[], &[]), 0.01);
        assert_eq!(rec.quantity.unwrap().value, 100.0);
        assert!(rec.price.is_none());
        assert!(rec.value.is_none());
        assert_eq!(rec.confidence, Confidence::Medium);
    }

    #[test]
    fn test_empty_slots_all_unknown() {
        let rec = reconcile(&harvested(&[], &[], &[]), 0.01);
        assert!(rec.quantity.is_none());
        assert!(rec.price.is_none());
        assert!(rec.value.is_none());
        assert_eq!(rec.confidence, Confidence::Low);
        assert!(!rec.warnings.is_empty());
    }

    #[test]
    fn test_zero_price_never_panics() {
        let rec = reconcile(&harvested(&[], &[0.0], &[25156.0]), 0.01);
        assert!(rec.quantity.is_none());
        assert_eq!(rec.confidence, Confidence::Low);
        assert!(!rec.warnings.is_empty());
    }

    #[test]
    fn test_distance_tie_break() {
        let mut h = HarvestedCandidates {
            quantities: vec![
                candidate(CandidateKind::Quantity, 70.0, "labeled:Quantity", 1, 80),
                candidate(CandidateKind::Quantity, 30.0, "labeled:Shares", 1, 12),
            ],
            prices: vec![],
            values: vec![],
            lot_size: None,
        };
        let rec = reconcile(&h, 0.01);
        // Equal priority; the candidate closer to the anchor wins.
        assert_eq!(rec.quantity.unwrap().value, 30.0);
        assert_eq!(rec.confidence, Confidence::Low);

        h.quantities.truncate(1);
        assert_eq!(reconcile(&h, 0.01).quantity.unwrap().value, 70.0);
    }

    #[test]
    fn test_fractional_quantity_preserved() {
        let rec = reconcile(&harvested(&[10.5], &[100.0], &[1050.0]), 0.01);
        assert_eq!(rec.quantity.unwrap().value, 10.5);
        assert_eq!(rec.confidence, Confidence::High);
    }
}
