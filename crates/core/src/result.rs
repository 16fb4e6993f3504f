use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::fragment::Fragment;
use crate::item::{ExtractedItem, LabeledAmount};
use crate::money::Money;

/// Totals block of the output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsBlock {
    pub subtotal: Option<Money>,
    pub tax: Money,
    pub fees: Vec<LabeledAmount>,
    pub total: Option<Money>,
}

/// One `quantity × unit_price ≈ line_total` check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowCheck {
    pub product_name: String,
    pub calculated: Money,
    pub expected: Money,
    pub passed: bool,
    /// True for package-discount items, where the per-unit arithmetic is
    /// expected to diverge and the check is not counted.
    pub skipped: bool,
}

/// One aggregate identity check (items vs subtotal, ladder vs total).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateCheck {
    pub name: String,
    pub calculated: Money,
    pub expected: Money,
    pub difference: Money,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub row_checks: Vec<RowCheck>,
    pub aggregate_checks: Vec<AggregateCheck>,
    pub passed: bool,
}

/// The terminal aggregate of one pipeline run. Never mutated after
/// construction; a failed validation is reported here, not raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub chain_id: Option<String>,
    pub store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<String>,
    pub items: Vec<ExtractedItem>,
    pub totals: TotalsBlock,
    pub validation: ValidationReport,
    pub error_log: Vec<String>,
    /// Verbatim passthrough of the input fragments, coordinates rounded
    /// to five decimal places, so downstream consumers can recover raw
    /// geometry without re-running OCR.
    pub ocr_fragments: Vec<Fragment>,
}
