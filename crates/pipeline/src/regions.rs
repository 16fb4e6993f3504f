use std::sync::OnceLock;

use regex::Regex;
use tillscan_config::{ItemsStartRule, StoreConfig};
use tillscan_core::{PhysicalRow, RowType};
use tillscan_match::{contains_marker, squash};
use tracing::{debug, info};

fn re_datetime() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"\d{2}/\d{2}/\d{2,4}\s+\d{1,2}:\d{2}:\d{2}\s*(?:[AP]M)?").expect("invalid regex")
    })
}

/// Vocabulary that disqualifies a row from starting the items region.
const HEADER_VOCAB: &[&str] = &[
    "STORE", "ADDRESS", "PHONE", "DATE", "TIME", "RECEIPT", "INVOICE", "WELCOME",
];

/// Receipt rows partitioned into the four document regions, in order.
#[derive(Debug, Default)]
pub struct Regions {
    pub header: Vec<PhysicalRow>,
    pub items: Vec<PhysicalRow>,
    pub totals: Vec<PhysicalRow>,
    pub payment: Vec<PhysicalRow>,
    /// Membership id captured while locating the items start, if any.
    pub membership: Option<String>,
}

impl Regions {
    /// All rows in document order.
    pub fn all_rows(&self) -> impl Iterator<Item = &PhysicalRow> {
        self.header
            .iter()
            .chain(&self.items)
            .chain(&self.totals)
            .chain(&self.payment)
    }
}

/// True for a standalone TOTAL line. "SUB TOTAL" never qualifies, however
/// it was spaced or dotted.
pub(crate) fn is_total_line(text: &str, total_markers: &[String]) -> bool {
    let sq = squash(text);
    if sq.contains("SUB") && sq.contains("TOTAL") {
        return false;
    }
    total_markers.iter().any(|m| {
        let needle = squash(m);
        !needle.is_empty() && sq.contains(&needle)
    })
}

/// One-pass monotonic state machine over the rows:
/// Header → Item → Totals → Payment. Every row receives exactly one type
/// and a region, and the machine never moves backwards.
pub fn split_regions(mut rows: Vec<PhysicalRow>, config: &StoreConfig) -> Regions {
    let subtotal_markers = config.markers.subtotal_markers();
    let total_markers = config.markers.total_markers();
    let payment_markers = config.markers.payment_markers();
    let membership_rx = config
        .header
        .membership_pattern
        .as_deref()
        .and_then(|p| Regex::new(p).ok());

    let mut items_start = match config.items.items_start {
        ItemsStartRule::AfterDatetimeRow => rows
            .iter()
            .position(|r| re_datetime().is_match(&r.text))
            .map(|i| i + 1),
        ItemsStartRule::FirstAmountRow => None,
    };

    let mut membership = None;
    let mut mode = RowType::Header;

    for i in 0..rows.len() {
        let text = rows[i].text.clone();

        if mode <= RowType::Item && contains_marker(&text, &subtotal_markers) {
            mode = RowType::Totals;
            debug!(row = rows[i].id, "subtotal marker starts totals region");
        } else if mode <= RowType::Item && is_total_line(&text, &total_markers) {
            mode = RowType::Totals;
            debug!(row = rows[i].id, "total line starts totals region");
        } else if mode == RowType::Totals && contains_marker(&text, &payment_markers) {
            mode = RowType::Payment;
            debug!(row = rows[i].id, "payment marker starts payment region");
        } else if mode == RowType::Header {
            match items_start {
                Some(start) if i >= start => {
                    if i == start && is_membership_row(&rows[i], membership_rx.as_ref()) {
                        membership = capture_membership(&text, membership_rx.as_ref());
                        items_start = Some(start + 1);
                        debug!(row = rows[i].id, "membership row skipped before items start");
                    } else {
                        mode = RowType::Item;
                    }
                }
                Some(_) => {}
                None => {
                    if looks_like_item_row(&rows[i]) {
                        mode = RowType::Item;
                    }
                }
            }
        }

        rows[i].row_type = mode;
    }

    let mut regions = Regions { membership, ..Regions::default() };
    for row in rows {
        match row.row_type {
            RowType::Item => regions.items.push(row),
            RowType::Totals => regions.totals.push(row),
            RowType::Payment => regions.payment.push(row),
            RowType::Header | RowType::Unknown => regions.header.push(row),
        }
    }

    info!(
        header = regions.header.len(),
        items = regions.items.len(),
        totals = regions.totals.len(),
        payment = regions.payment.len(),
        "region split complete"
    );
    regions
}

/// Default items-start rule: the first row with both left-side text and a
/// co-located amount, excluding rows speaking header vocabulary.
fn looks_like_item_row(row: &PhysicalRow) -> bool {
    if !row.has_amount() {
        return false;
    }
    if !row.text_fragments().any(|f| !f.text.is_empty()) {
        return false;
    }
    let upper = row.text.to_uppercase();
    !HEADER_VOCAB.iter().any(|v| upper.contains(v))
}

/// A membership-card row: matches the configured pattern and its amount
/// is exactly $0.00.
fn is_membership_row(row: &PhysicalRow, rx: Option<&Regex>) -> bool {
    let Some(rx) = rx else {
        return false;
    };
    if !rx.is_match(&row.text) {
        return false;
    }
    row.amount_fragments()
        .filter_map(|f| f.amount)
        .any(|m| m.is_zero())
        || row.text.contains("0.00")
}

fn capture_membership(text: &str, rx: Option<&Regex>) -> Option<String> {
    let caps = rx?.captures(text)?;
    if let Some(group) = caps.get(1) {
        return Some(group.as_str().to_string());
    }
    let digits: String = caps.get(0)?.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
