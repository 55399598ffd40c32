//! # Holdings Extractor
//!
//! A library for recovering normalized security records from unstructured
//! financial-document text (OCR output, extracted table cells): one record
//! per ISIN with quantity held, unit price, total value, a name guess, and
//! confidence/provenance metadata.
//!
//! ## Core Concepts
//!
//! - **Anchor**: the text position of a recognized ISIN; all nearby
//!   harvesting is relative to it
//! - **Candidate**: a provisional number extracted by one named pattern
//!   rule, tagged with its pattern id, locale hint, and anchor distance
//! - **Invariant check**: `price x quantity = value` within a relative
//!   tolerance, used to arbitrate between competing candidates
//! - **Reconciliation**: the three-slot resolution that picks, computes,
//!   lot-adjusts, or discards candidates and grades the result
//!   HIGH/MEDIUM/LOW
//!
//! The pipeline is a pure function of its input: no shared mutable state,
//! each anchor resolved in isolation, documents batch-parallel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use holdings_extractor::*;
//!
//! let input = DocumentInput::from_text(
//!     "US5949181045 Microsoft Corporation\n\
//!      Quantity: 100 shares\nPrice: $350.45\nValue: $35,045.00",
//! );
//!
//! let records = SecurityExtractor::new().extract(&input).unwrap();
//! assert_eq!(records[0].quantity, Some(100.0));
//! assert_eq!(records[0].confidence, Confidence::High);
//! ```

pub mod assembler;
pub mod error;
pub mod harvester;
pub mod locator;
pub mod normalizer;
pub mod reconciler;
pub mod schema;
pub mod utils;

pub use assembler::assemble;
pub use error::{ExtractionError, Result};
pub use harvester::{harvest, CandidateKind, HarvestedCandidates, RawCandidate};
pub use locator::{isin_checksum_valid, locate_isins, IsinAnchor};
pub use normalizer::{normalize_number, normalize_with_locale, NormalizedNumber};
pub use reconciler::{reconcile, Reconciliation, ResolutionMethod, ResolvedField};
pub use schema::*;

use log::{debug, info};
use rayon::prelude::*;

pub struct SecurityExtractor {
    config: ExtractorConfig,
}

impl SecurityExtractor {
    pub fn new() -> Self {
        Self {
            config: ExtractorConfig::default(),
        }
    }

    pub fn with_config(config: ExtractorConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    /// Extracts one record per ISIN anchor from a document.
    ///
    /// A failed resolution for one anchor never aborts its siblings; the
    /// affected record carries its reasons in `warnings` at Low confidence.
    /// Re-processing the same document yields equivalent records.
    pub fn extract(&self, input: &DocumentInput) -> Result<Vec<SecurityRecord>> {
        let mut anchors = locate_isins(&input.text);

        if self.config.validate_checksum {
            anchors.retain(|a| {
                let valid = isin_checksum_valid(&a.isin);
                if !valid {
                    debug!("Dropping anchor {} at {}: bad check digit", a.isin, a.start);
                }
                valid
            });
        }

        info!(
            "Processing document: {} anchors, {} tables",
            anchors.len(),
            input.tables.len()
        );

        let mut records = Vec::with_capacity(anchors.len());
        for anchor in &anchors {
            let harvested = harvest(
                &input.text,
                anchor,
                &input.tables,
                self.config.window_chars,
                self.config.locale,
            );
            debug!(
                "Anchor {}: {} quantity / {} price / {} value candidates, lot size {:?}",
                anchor.isin,
                harvested.quantities.len(),
                harvested.prices.len(),
                harvested.values.len(),
                harvested.lot_size
            );

            let reconciliation = reconcile(&harvested, self.config.tolerance);
            records.push(assemble(
                &input.text,
                anchor,
                reconciliation,
                self.config.window_chars,
            ));
        }

        if self.config.merge_duplicate_anchors {
            records = merge_duplicates(records);
        }

        Ok(records)
    }

    /// Parses the JSON input contract and extracts. This is the Fatal
    /// boundary: malformed input fails the whole document here.
    pub fn extract_json(&self, json: &str) -> Result<Vec<SecurityRecord>> {
        let input = DocumentInput::from_json(json)?;
        self.extract(&input)
    }

    /// Processes a batch of documents in parallel, one result each.
    pub fn extract_batch(&self, documents: &[DocumentInput]) -> Vec<Result<Vec<SecurityRecord>>> {
        documents.par_iter().map(|d| self.extract(d)).collect()
    }
}

impl Default for SecurityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts with the default configuration.
pub fn extract_securities(input: &DocumentInput) -> Result<Vec<SecurityRecord>> {
    SecurityExtractor::new().extract(input)
}

fn validate_config(config: &ExtractorConfig) -> Result<()> {
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(ExtractionError::InvalidTolerance(config.tolerance));
    }
    if config.window_chars == 0 {
        return Err(ExtractionError::InvalidWindow(config.window_chars));
    }
    Ok(())
}

/// Collapses records sharing an ISIN (narrative mention plus table row,
/// say) into one. The higher-confidence resolution wins; ties prefer more
/// resolved fields, then the earlier anchor.
fn merge_duplicates(records: Vec<SecurityRecord>) -> Vec<SecurityRecord> {
    let mut merged: Vec<SecurityRecord> = Vec::with_capacity(records.len());

    for mut record in records {
        match merged.iter().position(|r| r.isin == record.isin) {
            None => merged.push(record),
            Some(i) => {
                debug!(
                    "Merging duplicate anchor for {} ({:?} vs {:?})",
                    record.isin, record.confidence, merged[i].confidence
                );
                let note =
                    "Merged a duplicate anchor for this ISIN; kept the higher-ranked resolution"
                        .to_string();
                if prefer_replacement(&record, &merged[i]) {
                    record.warnings.push(note);
                    merged[i] = record;
                } else {
                    merged[i].warnings.push(note);
                }
            }
        }
    }

    merged
}

fn prefer_replacement(candidate: &SecurityRecord, incumbent: &SecurityRecord) -> bool {
    if candidate.confidence != incumbent.confidence {
        return candidate.confidence > incumbent.confidence;
    }
    resolved_fields(candidate) > resolved_fields(incumbent)
}

fn resolved_fields(record: &SecurityRecord) -> usize {
    [record.quantity, record.price, record.value]
        .iter()
        .filter(|f| f.is_some())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_labeled_fields() {
        let input = DocumentInput::from_text(
            "US5949181045 Microsoft Corporation\n\
             Quantity: 100 shares\nPrice: $350.45\nValue: $35,045.00",
        );

        let records = extract_securities(&input).unwrap();
        assert_eq!(records.len(), 1);

        let r = &records[0];
        assert_eq!(r.isin, "US5949181045");
        assert_eq!(r.name, "Microsoft Corporation");
        assert_eq!(r.quantity, Some(100.0));
        assert_eq!(r.price, Some(350.45));
        assert_eq!(r.value, Some(35045.0));
        assert_eq!(r.currency.as_deref(), Some("USD"));
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.provenance.quantity.as_deref(), Some("labeled:Quantity"));
    }

    #[test]
    fn test_one_bad_anchor_does_not_abort_the_rest() {
        // Enough filler to keep the second anchor's window clear of the
        // first anchor's figures.
        let text = format!(
            "US5949181045 Microsoft Corporation\n\
             Quantity: 100 shares\nPrice: $350.45\nValue: $35,045.00\n{}\n\
             XS0000000000 garbage position with no numbers at all",
            "filler ".repeat(80)
        );
        let input = DocumentInput::from_text(text);

        let records = extract_securities(&input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].confidence, Confidence::High);

        let degraded = &records[1];
        assert_eq!(degraded.isin, "XS0000000000");
        assert_eq!(degraded.confidence, Confidence::Low);
        assert!(degraded.quantity.is_none());
        assert!(!degraded.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_anchors_merge_to_higher_confidence() {
        // The narrative anchor's window holds no figures; the table-style
        // anchor far below resolves fully. Merge keeps the latter.
        let text = format!(
            "Narrative mentions US5949181045 without figures.\n{}\n\
             US5949181045\nQuantity: 100 shares\nPrice: $350.45\nValue: $35,045.00",
            "filler ".repeat(80)
        );
        let input = DocumentInput::from_text(text);

        let records = extract_securities(&input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, Some(100.0));
        assert_eq!(records[0].confidence, Confidence::High);
        assert!(records[0]
            .warnings
            .iter()
            .any(|w| w.contains("duplicate anchor")));
    }

    #[test]
    fn test_duplicate_merge_can_be_disabled() {
        let config = ExtractorConfig {
            merge_duplicate_anchors: false,
            ..Default::default()
        };
        let extractor = SecurityExtractor::with_config(config).unwrap();
        let input = DocumentInput::from_text("US5949181045 and again US5949181045");
        let records = extractor.extract(&input).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_checksum_filter_drops_invalid_anchors() {
        let config = ExtractorConfig {
            validate_checksum: true,
            ..Default::default()
        };
        let extractor = SecurityExtractor::with_config(config).unwrap();
        // Valid check digit vs the same ISIN with the digit off by one.
        let input = DocumentInput::from_text("US5949181045 versus US5949181044");
        let records = extractor.extract(&input).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].isin, "US5949181045");
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad_tolerance = ExtractorConfig {
            tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            SecurityExtractor::with_config(bad_tolerance),
            Err(ExtractionError::InvalidTolerance(_))
        ));

        let bad_window = ExtractorConfig {
            window_chars: 0,
            ..Default::default()
        };
        assert!(matches!(
            SecurityExtractor::with_config(bad_window),
            Err(ExtractionError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_malformed_json_is_fatal() {
        let extractor = SecurityExtractor::new();
        assert!(matches!(
            extractor.extract_json("{\"no_text_field\": true}"),
            Err(ExtractionError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let input = DocumentInput::from_text(
            "US5949181045 Microsoft Corporation\nQuantity: 100 shares\nPrice: $350.45",
        );
        let extractor = SecurityExtractor::new();
        let first = extractor.extract(&input).unwrap();
        let second = extractor.extract(&input).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
