use serde::{Deserialize, Serialize};

use crate::fragment::Fragment;

/// Region classification of a physical row. The ordering is the document
/// ordering: once the splitter advances past a region it never goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowType {
    Unknown,
    Header,
    Item,
    Totals,
    Payment,
}

/// A group of fragments judged to lie on one printed line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalRow {
    pub id: usize,
    /// Member fragments, sorted left to right.
    pub fragments: Vec<Fragment>,
    pub y_top: f64,
    pub y_bottom: f64,
    pub center_y: f64,
    /// Row text reconstructed by joining fragment texts left to right.
    pub text: String,
    pub row_type: RowType,
}

impl PhysicalRow {
    pub fn amount_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments
            .iter()
            .filter(|f| f.is_amount && f.amount.is_some())
    }

    pub fn text_fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(|f| !f.is_amount)
    }

    pub fn has_amount(&self) -> bool {
        self.amount_fragments().next().is_some()
    }
}

/// The dominant horizontal position where currency figures are aligned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmountColumn {
    pub x: f64,
    pub tolerance: f64,
    pub confidence: f64,
    pub count: usize,
}

impl AmountColumn {
    pub fn contains(&self, fragment: &Fragment) -> bool {
        (fragment.center_x - self.x).abs() <= self.tolerance
    }
}

/// All detected amount columns. `main` is the rightmost strong cluster;
/// `all` holds every peak left to right (a second strong peak serves
/// unit-price vs. line-total layouts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountColumns {
    pub main: AmountColumn,
    pub all: Vec<AmountColumn>,
}

impl AmountColumns {
    /// The strongest column other than the main one, if any.
    pub fn secondary(&self) -> Option<&AmountColumn> {
        self.all
            .iter()
            .filter(|c| (c.x - self.main.x).abs() > self.main.tolerance)
            .max_by(|a, b| a.count.cmp(&b.count))
    }
}
