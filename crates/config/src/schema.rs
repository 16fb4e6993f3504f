use std::collections::HashSet;

use serde::Deserialize;

/// Marker variants used when a chain config does not override them.
pub const DEFAULT_SUBTOTAL_MARKERS: &[&str] = &["SUB TOTAL", "SUBTOTAL", "SUB-TOTAL"];
pub const DEFAULT_TOTAL_MARKERS: &[&str] =
    &["TOTAL SALES", "GRAND TOTAL", "TOTAL DUE", "TOTAL"];
pub const DEFAULT_PAYMENT_MARKERS: &[&str] = &[
    "VISA",
    "MASTERCARD",
    "AMEX",
    "DISCOVER",
    "CASH",
    "DEBIT",
    "PAYMENT",
    "TENDER",
    "REFERENCE#",
    "AMOUNT : USD",
    "AMOUNT:USD",
];
/// Grocery category labels that never belong in product names.
pub const DEFAULT_SECTION_HEADERS: &[&str] =
    &["FOOD", "PRODUCE", "DELI", "DAIRY", "BAKERY", "MEAT", "FROZEN", "GROCERY"];

/// Immutable per-chain extraction rules. Loaded once per chain and shared
/// read-only across concurrent parses; a missing or malformed file falls
/// back to `StoreConfig::default()`, which carries the universal rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub identification: Identification,
    #[serde(default)]
    pub markers: Markers,
    #[serde(default)]
    pub items: ItemRules,
    #[serde(default)]
    pub wash: WashRules,
    #[serde(default)]
    pub skew: SkewRules,
    #[serde(default)]
    pub header: HeaderRules,
    #[serde(default)]
    pub checks: CheckRules,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Identification {
    #[serde(default)]
    pub primary_name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Identification {
    /// True when `text` mentions this chain by primary name or alias.
    pub fn matches(&self, text: &str) -> bool {
        let upper = text.to_uppercase();
        if let Some(name) = &self.primary_name {
            if !name.is_empty() && upper.contains(&name.to_uppercase()) {
                return true;
            }
        }
        self.aliases
            .iter()
            .any(|a| !a.is_empty() && upper.contains(&a.to_uppercase()))
    }
}

/// Region marker lists. Empty lists fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Markers {
    #[serde(default)]
    pub subtotal: Vec<String>,
    #[serde(default)]
    pub total: Vec<String>,
    #[serde(default)]
    pub payment_start: Vec<String>,
}

impl Markers {
    pub fn subtotal_markers(&self) -> Vec<String> {
        effective(&self.subtotal, DEFAULT_SUBTOTAL_MARKERS)
    }

    pub fn total_markers(&self) -> Vec<String> {
        effective(&self.total, DEFAULT_TOTAL_MARKERS)
    }

    pub fn payment_markers(&self) -> Vec<String> {
        effective(&self.payment_start, DEFAULT_PAYMENT_MARKERS)
    }
}

fn effective(configured: &[String], defaults: &[&str]) -> Vec<String> {
    if configured.is_empty() {
        defaults.iter().map(|s| s.to_string()).collect()
    } else {
        configured.to_vec()
    }
}

/// How the region splitter decides where the items region begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemsStartRule {
    /// First row whose left side looks like a product name with a
    /// co-located amount.
    #[default]
    FirstAmountRow,
    /// Items begin on the row after the recognized date/time row; a
    /// membership row with a $0.00 amount immediately after is skipped.
    AfterDatetimeRow,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemRules {
    #[serde(default)]
    pub items_start: ItemsStartRule,
    /// Extra section-header tokens on top of the built-in grocery set.
    #[serde(default)]
    pub section_headers: Vec<String>,
    /// Fixed typo substitutions, applied before edit-distance correction.
    #[serde(default)]
    pub typos: Vec<(String, String)>,
    /// Rows matching these patterns are fees, not items (bottle deposits,
    /// environmental fees printed inside the items region).
    #[serde(default)]
    pub fee_row_patterns: Vec<String>,
}

impl ItemRules {
    /// Built-in section headers plus configured extras, uppercased.
    pub fn section_header_set(&self) -> HashSet<String> {
        DEFAULT_SECTION_HEADERS
            .iter()
            .map(|s| s.to_string())
            .chain(self.section_headers.iter().map(|s| s.trim().to_uppercase()))
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Patterns that strip the amount flag from matching fragments before the
/// pipeline runs (points balances, card suffixes, store coupon codes).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WashRules {
    #[serde(default)]
    pub amount_exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkewRules {
    /// Pattern of a line expected to be perfectly horizontal (e.g. the
    /// timestamp/operator line). Absent → no skew correction.
    #[serde(default)]
    pub reference_pattern: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderRules {
    /// Membership-card line pattern (e.g. `\*{2,}\d+`).
    #[serde(default)]
    pub membership_pattern: Option<String>,
}

/// Math-validation tolerances, in cents.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRules {
    #[serde(default = "default_row_tolerance")]
    pub row_tolerance_cents: i64,
    #[serde(default = "default_aggregate_tolerance")]
    pub aggregate_tolerance_cents: i64,
    /// Tax above this fraction of the subtotal is reclassified as a fee.
    #[serde(default = "default_max_tax_ratio")]
    pub max_tax_ratio: f64,
}

fn default_row_tolerance() -> i64 {
    1
}

fn default_aggregate_tolerance() -> i64 {
    3
}

fn default_max_tax_ratio() -> f64 {
    0.20
}

impl Default for CheckRules {
    fn default() -> Self {
        CheckRules {
            row_tolerance_cents: default_row_tolerance(),
            aggregate_tolerance_cents: default_aggregate_tolerance(),
            max_tax_ratio: default_max_tax_ratio(),
        }
    }
}
