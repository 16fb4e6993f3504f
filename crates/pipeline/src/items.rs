use std::collections::HashSet;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use tillscan_config::StoreConfig;
use tillscan_core::{
    AmountColumns, AmountRole, AmountUsageTracker, ExtractedItem, Fragment, LabeledAmount, Money,
    PhysicalRow,
};
use tillscan_match::within_one_edit;
use tracing::{debug, info, warn};

use crate::regions::Regions;

/// Domain wordlist for one-edit OCR slip correction. A word is corrected
/// only when exactly one entry is a single edit away.
const RECEIPT_WORDS: &[&str] = &[
    "TARE", "TAIWANESE", "REMOVED", "SALE", "FOOD", "PRODUCE", "DELI", "MEAT", "BABY", "NAPA",
    "BROCCOLI", "ONION", "GREEN", "DONUTS", "LAMB", "ROLLS", "SHANGHAI", "BOK", "CHOY", "KOREAN",
    "ENOKI", "MUSHROOM", "PAPER", "PACKAGE", "WEIGHT", "HOT", "GROCERY", "CHINESE", "CROWN",
    "PONKAN", "YU-CHOY", "SUM", "SPROUT", "SLICED", "ITEM", "COUNT", "SOYMILK",
];

/// Tax/fee marker codes printed after amounts (FP = final price, T = taxed).
const TRAILING_MARKER_CODES: &[&str] = &["FP", "P", "T", "F", "N", "E"];

fn re_weight_qty() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(lb|kg|oz|g|ml|l)\s*@\s*\$?(\d+(?:\.\d+)?)(?:\s*/\s*(?:lb|kg|oz|g))?")
            .expect("invalid regex")
    })
}

fn re_count_qty() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*@\s*\$?(\d+(?:\.\d+)?)").expect("invalid regex"))
}

fn re_package_at() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    // "3 @ 3/$1.98" — quantity, pack size, pack price.
    R.get_or_init(|| Regex::new(r"\b(\d{1,2})\s*@\s*\d{1,2}\s*/\s*\$?(\d+\.\d{2})").expect("invalid regex"))
}

fn re_package_slash() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    // "2/$9.00"
    R.get_or_init(|| Regex::new(r"\b(\d{1,2})\s*/\s*\$(\d+\.\d{2})").expect("invalid regex"))
}

fn re_package_for() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    // "2 for $9.00"
    R.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})\s+for\s+\$?(\d+\.\d{2})").expect("invalid regex"))
}

fn re_sku() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\b\d{5,7}\b").expect("invalid regex"))
}

fn re_amount_text() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\$?\d+\.\d{2}\b").expect("invalid regex"))
}

fn re_fp_token() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\bFP\b").expect("invalid regex"))
}

fn re_sale_prefix() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)^\(SALE\)\s*").expect("invalid regex"))
}

fn re_points_line() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\bPoints\s*\d+").expect("invalid regex"))
}

fn re_points_noise() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"^\s*\+1\s+(?:0\s+)?").expect("invalid regex"))
}

fn re_suffix_line() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)^(?:TARE\s+REMOVED|REMOVED)\s*$").expect("invalid regex"))
}

/// Items plus any fee rows found inside the items region (bottle
/// deposits, environmental fees — config-driven).
#[derive(Debug, Default)]
pub struct ItemExtraction {
    pub items: Vec<ExtractedItem>,
    pub fees: Vec<LabeledAmount>,
}

/// Pair every unclaimed amount in the amount column with a product name.
///
/// The rules, in order: membership/points rows are retired; configured
/// fee rows go to the fee list; a lone amount (no left-side text) is left
/// unclaimed rather than guessed at; a bare section-header row donates its
/// amount to the next product row; everything else takes the current
/// row's left text, extended over continuation rows that carry no amount.
pub fn extract_items(
    regions: &Regions,
    columns: &AmountColumns,
    tracker: &mut AmountUsageTracker,
    config: &StoreConfig,
    error_log: &mut Vec<String>,
) -> ItemExtraction {
    let rows = &regions.items;
    let headers = config.items.section_header_set();
    let membership_rx = config
        .header
        .membership_pattern
        .as_deref()
        .and_then(|p| Regex::new(p).ok());
    let fee_rxs: Vec<Regex> = config
        .items
        .fee_row_patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!(pattern = %p, error = %e, "invalid fee row pattern skipped");
                None
            }
        })
        .collect();

    let boundary = left_right_boundary(rows);
    debug!(boundary, "using left/right column boundary for item extraction");

    let mut extraction = ItemExtraction::default();
    let mut used_name_rows: HashSet<usize> = HashSet::new();
    let mut used_qty_rows: HashSet<usize> = HashSet::new();
    let mut current_section: Option<String> = None;

    for idx in 0..rows.len() {
        let row = &rows[idx];
        let row_left_raw = left_text(row, boundary);

        if is_header_only(&row_left_raw, &headers) {
            current_section = Some(row_left_raw.to_uppercase());
        }

        let mut row_amounts: Vec<Fragment> = row
            .amount_fragments()
            .filter(|f| !tracker.is_used(f) && columns.main.contains(f))
            .cloned()
            .collect();
        row_amounts.sort_by(|a, b| {
            a.center_y.total_cmp(&b.center_y).then(a.center_x.total_cmp(&b.center_x))
        });

        for amount_frag in row_amounts {
            let Some(line_total) = amount_frag.amount else {
                continue;
            };

            if is_non_item(&row.text, line_total, membership_rx.as_ref()) {
                tracker.claim(&amount_frag, AmountRole::Skipped);
                debug!(row = row.id, text = %row.text, "skipped non-item row");
                continue;
            }

            if !line_total.is_zero() {
                if let Some(label) = fee_row_label(&row.text, &fee_rxs) {
                    tracker.claim(&amount_frag, AmountRole::Fee);
                    info!(row = row.id, %label, amount = %line_total, "fee row inside items region");
                    extraction.fees.push(LabeledAmount { label, amount: line_total });
                    continue;
                }
            }

            if row_left_raw.is_empty() {
                // A lone amount is never attached to a distant product;
                // leave it unclaimed and let validation flag the gap.
                warn!(row = row.id, amount = %line_total, "lone amount left unclaimed");
                error_log.push(format!(
                    "amount {line_total} on row {} has no left-side text; left unclaimed",
                    row.id
                ));
                continue;
            }

            let name_idx = if is_header_only(&row_left_raw, &headers)
                || used_name_rows.contains(&row.id)
            {
                next_product_row(rows, idx + 1, boundary, &headers, &used_name_rows)
            } else {
                Some(idx)
            };
            let Some(name_idx) = name_idx else {
                tracker.claim(&amount_frag, AmountRole::Skipped);
                error_log.push(format!(
                    "no unclaimed product name found for amount {line_total} on row {}",
                    row.id
                ));
                continue;
            };

            used_name_rows.insert(rows[name_idx].id);
            let mut name_raw = left_text(&rows[name_idx], boundary);

            // Multi-line names: swallow following rows that carry text
            // but no amount at all. Only from the amount's own row — in
            // shifted layouts the row below already names the next item.
            if name_idx == idx {
                let mut cont = name_idx + 1;
                while let Some(next) = rows.get(cont) {
                    if next.has_amount() {
                        break;
                    }
                    let t = left_text(next, boundary);
                    if t.is_empty()
                        || is_header_only(&t, &headers)
                        || is_qty_unit_line(&t)
                        || re_suffix_line().is_match(&t)
                        || used_name_rows.contains(&next.id)
                    {
                        break;
                    }
                    name_raw.push(' ');
                    name_raw.push_str(&t);
                    used_name_rows.insert(next.id);
                    cont += 1;
                }
            }

            // Quantity/unit sub-patterns live on the amount row, the name
            // row, or the row immediately after either.
            let mut qty_sources: Vec<(usize, String)> = vec![(idx, row_left_raw.clone())];
            if name_idx != idx {
                qty_sources.push((name_idx, name_raw.clone()));
            }
            for follow in [idx + 1, name_idx + 1] {
                if qty_sources.iter().any(|(i, _)| *i == follow) {
                    continue;
                }
                if let Some(next) = rows.get(follow) {
                    let t = left_text(next, boundary);
                    if is_qty_unit_line(&t) {
                        qty_sources.push((follow, t));
                    }
                }
            }

            let mut quantity = None;
            let mut unit_price = None;
            let mut unit = None;
            for (src, text) in &qty_sources {
                if *src != idx && used_qty_rows.contains(src) {
                    continue;
                }
                if let Some((q, up, u)) = parse_qty_unit(text, line_total) {
                    quantity = Some(q);
                    unit_price = Some(up);
                    unit = u;
                    if *src != idx && *src != name_idx {
                        used_qty_rows.insert(*src);
                    }
                    break;
                }
            }

            // Package discounts: mark the sale; per-row arithmetic is
            // expected to diverge, so no quantity is forced unless the
            // row carries the whole package.
            let mut on_sale = false;
            for (_, text) in &qty_sources {
                if let Some((pack_qty, pack_total)) = parse_package(text) {
                    on_sale = true;
                    if quantity.is_none()
                        && pack_total.abs_diff(line_total) <= Money::from_cents(5)
                    {
                        quantity = Some(pack_qty);
                        unit_price =
                            Some(Money::from_decimal(pack_total.as_decimal() / pack_qty));
                    }
                    break;
                }
            }

            let (mut name, sale_prefix) = clean_product_name(&name_raw, config, &headers);
            on_sale |= sale_prefix;
            if name.is_empty() {
                name = name_raw.trim().to_string();
            }

            // Unit-price column (two-column layouts): accept the row's
            // secondary-column amount as the unit price only when the
            // arithmetic confirms it.
            if unit_price.is_none() {
                if let (Some(q), Some(secondary)) = (quantity, columns.secondary()) {
                    let candidate = row
                        .amount_fragments()
                        .find(|f| {
                            f.id != amount_frag.id && !tracker.is_used(f) && secondary.contains(f)
                        })
                        .cloned();
                    if let Some(frag) = candidate {
                        if let Some(m) = frag.amount {
                            if m.mul_qty(q).abs_diff(line_total) <= Money::from_cents(5) {
                                tracker.claim(&frag, AmountRole::UnitPrice);
                                unit_price = Some(m);
                            }
                        }
                    }
                }
            }

            tracker.claim(&amount_frag, AmountRole::ItemTotal);
            debug!(name = %name, total = %line_total, on_sale, "extracted item");
            extraction.items.push(ExtractedItem {
                product_name: name,
                quantity,
                unit,
                unit_price,
                line_total,
                on_sale,
                category: current_section.clone(),
            });
        }
    }

    info!(
        items = extraction.items.len(),
        fees = extraction.fees.len(),
        rows = rows.len(),
        "item extraction complete"
    );
    extraction
}

/// X boundary between the name column and the amount column: midpoint of
/// the widest gap in fragment positions across the items region.
fn left_right_boundary(rows: &[PhysicalRow]) -> f64 {
    let mut xs: Vec<f64> = rows
        .iter()
        .flat_map(|r| r.fragments.iter().map(|f| f.center_x))
        .collect();
    if xs.len() < 2 {
        return 0.6;
    }
    xs.sort_by(|a, b| a.total_cmp(b));
    let mut best_gap = 0.0;
    let mut boundary = 0.6;
    for pair in xs.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > best_gap {
            best_gap = gap;
            boundary = (pair[0] + pair[1]) / 2.0;
        }
    }
    boundary
}

fn left_text(row: &PhysicalRow, boundary: f64) -> String {
    row.fragments
        .iter()
        .filter(|f| f.center_x < boundary)
        .map(|f| f.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// True when the text is nothing but section-header words.
fn is_header_only(text: &str, headers: &HashSet<String>) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    !words.is_empty() && words.iter().all(|w| headers.contains(&w.to_uppercase()))
}

fn is_non_item(text: &str, amount: Money, membership_rx: Option<&Regex>) -> bool {
    if !amount.is_zero() {
        return false;
    }
    re_points_line().is_match(text) || membership_rx.is_some_and(|rx| rx.is_match(text))
}

fn fee_row_label(text: &str, fee_rxs: &[Regex]) -> Option<String> {
    fee_rxs
        .iter()
        .find_map(|rx| rx.find(text))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn next_product_row(
    rows: &[PhysicalRow],
    from: usize,
    boundary: f64,
    headers: &HashSet<String>,
    used: &HashSet<usize>,
) -> Option<usize> {
    for j in from..rows.len().min(from + 4) {
        let t = left_text(&rows[j], boundary);
        if t.is_empty() {
            if rows[j].has_amount() {
                break;
            }
            continue;
        }
        if is_header_only(&t, headers) || is_qty_unit_line(&t) || re_suffix_line().is_match(&t) {
            continue;
        }
        if used.contains(&rows[j].id) {
            continue;
        }
        return Some(j);
    }
    None
}

fn re_lb_slash_typo() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)/1b\b").expect("invalid regex"))
}

fn re_lb_token_typo() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)\b1b\b").expect("invalid regex"))
}

fn re_at_as_eight_typo() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"\b(\d{1,2})\s+8\s+(\d+\s*/\s*\$)").expect("invalid regex"))
}

/// Undo the OCR's favourite unit mangles: `/1b` for `/lb`, a stray `1b`
/// token for `lb`, and `@` read as `8` in package pricing.
fn fix_ocr_units(text: &str) -> String {
    let t = re_lb_slash_typo().replace_all(text, "/lb");
    let t = re_lb_token_typo().replace_all(&t, "lb");
    let t = re_at_as_eight_typo().replace_all(&t, "$1 @ $2");
    t.into_owned()
}

pub(crate) fn is_qty_unit_line(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    let t = fix_ocr_units(text);
    re_weight_qty().is_match(&t) || re_package_at().is_match(&t) || {
        // A count line like "2 @ $4.99" with nothing else on it.
        re_count_qty().is_match(&t) && re_amount_text().is_match(&t)
    }
}

/// Parse `qty unit @ unit-price` or `qty @ unit-price`, accepting the
/// match only when the arithmetic closes against the line total.
fn parse_qty_unit(text: &str, line_total: Money) -> Option<(Decimal, Money, Option<String>)> {
    let t = fix_ocr_units(text);

    if let Some(c) = re_weight_qty().captures(&t) {
        let parsed = (|| {
            let qty = Decimal::from_str(c.get(1)?.as_str()).ok()?;
            let unit = c.get(2)?.as_str().to_lowercase();
            let unit_price = Money::parse(c.get(3)?.as_str())?;
            Some((qty, unit_price, unit))
        })();
        if let Some((qty, unit_price, unit)) = parsed {
            // Weight rounding can be off by more than a cent on heavy items.
            let tol_cents = (line_total.to_cents() * 2 / 100).max(10);
            if unit_price.mul_qty(qty).abs_diff(line_total) <= Money::from_cents(tol_cents) {
                return Some((qty, unit_price, Some(unit)));
            }
        }
    }

    if let Some(c) = re_count_qty().captures(&t) {
        let parsed = (|| {
            let qty = Decimal::from_str(c.get(1)?.as_str()).ok()?;
            let unit_price = Money::parse(c.get(2)?.as_str())?;
            Some((qty, unit_price))
        })();
        if let Some((qty, unit_price)) = parsed {
            if unit_price.mul_qty(qty).abs_diff(line_total) <= Money::from_cents(5) {
                return Some((qty, unit_price, None));
            }
        }
    }

    None
}

/// Detect package-discount pricing (`2/$9.00`, `2 for $9.00`,
/// `3 @ 3/$1.98`); returns the pack quantity and pack price.
fn parse_package(text: &str) -> Option<(Decimal, Money)> {
    let t = fix_ocr_units(text);
    for rx in [re_package_at(), re_package_for(), re_package_slash()] {
        if let Some(c) = rx.captures(&t) {
            let qty = Decimal::from_str(c.get(1)?.as_str()).ok()?;
            let total = Money::parse(c.get(2)?.as_str())?;
            if qty > Decimal::ZERO {
                return Some((qty, total));
            }
        }
    }
    None
}

/// Name cleanup: strip pricing sub-patterns, SKUs, marker codes, points
/// noise and section-header words, then run the typo table and one-edit
/// dictionary correction. Returns the name and whether a `(SALE)` prefix
/// was found.
fn clean_product_name(
    raw: &str,
    config: &StoreConfig,
    headers: &HashSet<String>,
) -> (String, bool) {
    let mut name = fix_ocr_units(raw);

    let on_sale = re_sale_prefix().is_match(name.trim());
    name = re_sale_prefix().replace(name.trim(), "").into_owned();

    name = re_weight_qty().replace_all(&name, " ").into_owned();
    name = re_package_at().replace_all(&name, " ").into_owned();
    name = re_package_for().replace_all(&name, " ").into_owned();
    name = re_package_slash().replace_all(&name, " ").into_owned();
    name = re_count_qty().replace_all(&name, " ").into_owned();
    name = re_amount_text().replace_all(&name, " ").into_owned();
    name = re_fp_token().replace_all(&name, " ").into_owned();
    name = re_points_noise().replace(&name, "").into_owned();
    name = re_sku().replace_all(&name, " ").into_owned();

    let mut words: Vec<String> = name.split_whitespace().map(String::from).collect();
    while words
        .last()
        .is_some_and(|w| w.len() <= 2 && TRAILING_MARKER_CODES.contains(&w.to_uppercase().as_str()))
    {
        words.pop();
    }
    while words.first().is_some_and(|w| headers.contains(&w.to_uppercase())) {
        words.remove(0);
    }
    while words.last().is_some_and(|w| headers.contains(&w.to_uppercase())) {
        words.pop();
    }
    name = words.join(" ");

    for (wrong, right) in &config.items.typos {
        if let Ok(rx) = Regex::new(&format!("(?i){}", regex::escape(wrong))) {
            name = rx.replace_all(&name, right.as_str()).into_owned();
        }
    }

    let corrected: Vec<String> = name
        .split_whitespace()
        .map(|w| one_edit_correct(w, headers).unwrap_or_else(|| w.to_string()))
        .collect();

    (corrected.join(" "), on_sale)
}

fn one_edit_correct(word: &str, headers: &HashSet<String>) -> Option<String> {
    if word.len() < 3 {
        return None;
    }
    let upper = word.to_uppercase();
    if headers.contains(&upper) || RECEIPT_WORDS.contains(&upper.as_str()) {
        return None;
    }
    let candidates: Vec<&str> = RECEIPT_WORDS
        .iter()
        .copied()
        .filter(|d| within_one_edit(&upper, d))
        .collect();
    if candidates.len() != 1 {
        return None;
    }
    let hit = candidates[0];
    let corrected = if word.chars().all(|c| !c.is_lowercase()) {
        hit.to_string()
    } else if word.chars().next().is_some_and(|c| c.is_uppercase()) {
        let mut s = hit.to_lowercase();
        if let Some(first) = s.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        s
    } else {
        hit.to_lowercase()
    };
    Some(corrected)
}
