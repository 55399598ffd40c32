use crate::error::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Input contract handed over by the text/table extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DocumentInput {
    #[schemars(description = "Full document text, typically OCR output")]
    pub text: String,

    #[schemars(description = "Detected table structures, each as a list of rows of cell strings")]
    #[serde(default)]
    pub tables: Vec<Table>,
}

impl DocumentInput {
    /// Parses the JSON input contract. Malformed input fails the whole
    /// document here, never per anchor.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tables: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

/// Number style inferred from the separator pattern of a raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocaleHint {
    #[schemars(description = "Period decimal separator, comma thousands (35,045.00)")]
    Us,
    #[schemars(description = "Comma decimal separator, period thousands (35.045,00)")]
    European,
    Unknown,
}

/// How strongly the resolution method supports the output figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    #[schemars(description = "Ranked fallback, no invariant support")]
    Low,
    #[schemars(description = "Single unambiguous candidates or a discrepancy override")]
    Medium,
    #[schemars(description = "price x quantity = value verified within tolerance")]
    High,
}

/// Which pattern or arithmetic step produced each resolved field.
///
/// Values are pattern ids (`labeled:Quantity`), `computed:<formula>` for
/// arithmetic completion, or `lot-adjusted:<pattern id>` for a lot-size
/// multiplied quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Provenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// One normalized record per security. Immutable after assembly; downstream
/// consumers only read it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityRecord {
    #[schemars(description = "Well-formed 12-character ISIN, the anchor identity")]
    pub isin: String,

    #[schemars(description = "Best-guess security name, possibly a synthesized placeholder")]
    pub name: String,

    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub value: Option<f64>,

    #[schemars(description = "3-letter currency code inferred near the value candidate")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    pub confidence: Confidence,
    pub provenance: Provenance,

    #[schemars(description = "Structured reasons for degraded or overridden resolutions")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Tuning knobs for the extraction pipeline. The defaults reproduce the
/// observed behavior; validated before processing starts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractorConfig {
    #[schemars(description = "Relative tolerance for the price x quantity = value invariant")]
    pub tolerance: f64,

    #[schemars(description = "Characters of context on each side of an ISIN anchor")]
    pub window_chars: usize,

    #[schemars(description = "Drop anchors that fail the ISO 6166 check digit (off by default)")]
    pub validate_checksum: bool,

    #[schemars(description = "Collapse records for the same ISIN into one, higher confidence wins")]
    pub merge_duplicate_anchors: bool,

    #[schemars(description = "Document-level locale, overriding per-token inference when set")]
    pub locale: Option<LocaleHint>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            window_chars: 400,
            validate_checksum: false,
            merge_duplicate_anchors: true,
            locale: None,
        }
    }
}
