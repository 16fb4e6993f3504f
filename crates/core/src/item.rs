use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// One purchased line item, as reconstructed from the items region.
/// Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Money>,
    pub line_total: Money,
    pub on_sale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A `{label, amount}` pair as reported in the totals block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledAmount {
    pub label: String,
    pub amount: Money,
}

/// Classification of a middle amount (between subtotal and total).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Tax,
    Fee,
    Generic,
}

/// An amount anchored in the totals region (the subtotal or the total),
/// with enough identity to claim its fragment and order by position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TotalsAnchor {
    pub row_id: usize,
    pub fragment_id: usize,
    pub amount: Money,
    pub center_y: f64,
}

/// An unclaimed amount found strictly between the two anchors, paired
/// with whatever left-side label text accompanies it. Classified later
/// by the tax/fee classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddleCandidate {
    pub row_id: usize,
    pub fragment_id: usize,
    pub label: String,
    pub amount: Money,
}

/// The totals ladder: subtotal, the amounts between, and the total.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TotalsSequence {
    pub subtotal: Option<TotalsAnchor>,
    pub total: Option<TotalsAnchor>,
    pub middle: Vec<MiddleCandidate>,
}

impl TotalsSequence {
    /// Subtotal plus all middle amounts — what the printed total should be.
    pub fn projected_total(&self) -> Option<Money> {
        let sub = self.subtotal.map(|a| a.amount)?;
        Some(sub + self.middle.iter().map(|m| m.amount).sum())
    }
}
