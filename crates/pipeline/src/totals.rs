use tillscan_config::StoreConfig;
use tillscan_core::{
    AmountColumns, AmountRole, AmountUsageTracker, Fragment, MiddleCandidate, Money, PhysicalRow,
    TotalsAnchor, TotalsSequence,
};
use tillscan_match::contains_marker;
use tracing::{debug, info, warn};

use crate::regions::{is_total_line, Regions};

/// Middle amounts slightly left of the main column still count when they
/// sit in the right half of the page (tax columns drift).
const MIDDLE_AMOUNT_MIN_X: f64 = 0.4;

/// Locate the subtotal and total anchors in the totals region and collect
/// the unclaimed amounts strictly between them.
///
/// Anchor ties resolve deterministically: the first unclaimed occurrence
/// in row order at the expected column wins; later matches are logged as
/// ambiguity warnings, never errors.
pub fn extract_totals(
    regions: &Regions,
    columns: &AmountColumns,
    tracker: &mut AmountUsageTracker,
    config: &StoreConfig,
    error_log: &mut Vec<String>,
) -> TotalsSequence {
    let subtotal_markers = config.markers.subtotal_markers();
    let total_markers = config.markers.total_markers();
    let rows = &regions.totals;

    let mut sequence = TotalsSequence::default();

    for (i, row) in rows.iter().enumerate() {
        if contains_marker(&row.text, &subtotal_markers) {
            if sequence.subtotal.is_some() {
                error_log.push(format!(
                    "ambiguous subtotal: row {} also matches a subtotal marker",
                    row.id
                ));
                warn!(row = row.id, "second subtotal candidate ignored");
            } else if let Some(frag) = amount_in_column(row, columns, tracker) {
                tracker.claim(&frag, AmountRole::Subtotal);
                let found = anchor(row, &frag);
                info!(amount = %found.amount, row = row.id, "found subtotal");
                sequence.subtotal = Some(found);
            }
            continue;
        }

        if is_total_line(&row.text, &total_markers) {
            if sequence.total.is_some() {
                error_log.push(format!(
                    "ambiguous total: row {} also matches a total marker",
                    row.id
                ));
                warn!(row = row.id, "second total candidate ignored");
                continue;
            }
            let found = amount_in_column(row, columns, tracker)
                .or_else(|| any_unclaimed_amount(row, tracker));
            if let Some(frag) = found {
                tracker.claim(&frag, AmountRole::Total);
                sequence.total = Some(anchor(row, &frag));
                continue;
            }
            // The TOTAL label and its amount sometimes land on adjacent
            // physical rows; heal by looking one row down.
            if let Some(next) = rows.get(i + 1) {
                if let Some(frag) = any_unclaimed_amount(next, tracker) {
                    tracker.claim(&frag, AmountRole::Total);
                    debug!(label_row = row.id, amount_row = next.id, "total amount healed from next row");
                    sequence.total = Some(anchor(row, &frag));
                    continue;
                }
            }
            warn!(row = row.id, "total marker row carries no usable amount");
        }
    }

    collect_middle_amounts(&mut sequence, rows, columns, tracker);
    sequence
}

fn collect_middle_amounts(
    sequence: &mut TotalsSequence,
    rows: &[PhysicalRow],
    columns: &AmountColumns,
    tracker: &AmountUsageTracker,
) {
    let Some(subtotal) = sequence.subtotal else {
        return;
    };
    // Without a total anchor, everything below the subtotal inside the
    // totals region is a candidate.
    let y_sub = subtotal.center_y;
    let y_tot = sequence.total.map(|t| t.center_y).unwrap_or(y_sub + 1.0);
    let (y_low, y_high) = (y_sub.min(y_tot), y_sub.max(y_tot));

    for row in rows {
        if row.center_y <= y_low || row.center_y >= y_high {
            continue;
        }
        for frag in row.amount_fragments() {
            if tracker.is_used(frag) {
                continue;
            }
            if !columns.main.contains(frag) && frag.center_x <= MIDDLE_AMOUNT_MIN_X {
                continue;
            }
            let Some(amount) = frag.amount else { continue };
            let label = middle_label(row, frag);
            debug!(row = row.id, %amount, label = %label, "middle amount candidate");
            sequence.middle.push(MiddleCandidate {
                row_id: row.id,
                fragment_id: frag.id,
                label,
                amount,
            });
        }
    }
    info!(count = sequence.middle.len(), "collected middle amounts");
}

/// Left-side label accompanying a middle amount: the row's non-amount
/// text, or the row text minus the amount itself when OCR merged them.
fn middle_label(row: &PhysicalRow, amount: &Fragment) -> String {
    let left: String = row
        .text_fragments()
        .map(|f| f.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !left.trim().is_empty() {
        return left.trim().to_string();
    }
    row.text.replace(&amount.text, "").trim().to_string()
}

fn anchor(row: &PhysicalRow, frag: &Fragment) -> TotalsAnchor {
    TotalsAnchor {
        row_id: row.id,
        fragment_id: frag.id,
        amount: frag.amount.unwrap_or(Money::zero()),
        center_y: row.center_y,
    }
}

fn amount_in_column(
    row: &PhysicalRow,
    columns: &AmountColumns,
    tracker: &AmountUsageTracker,
) -> Option<Fragment> {
    row.amount_fragments()
        .find(|f| !tracker.is_used(f) && columns.main.contains(f))
        .cloned()
}

fn any_unclaimed_amount(row: &PhysicalRow, tracker: &AmountUsageTracker) -> Option<Fragment> {
    row.amount_fragments().find(|f| !tracker.is_used(f)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::detect_amount_columns;
    use tillscan_core::{Money, RowType};

    fn row(id: usize, specs: &[(&str, f64)], y: f64) -> PhysicalRow {
        let fragments: Vec<Fragment> = specs
            .iter()
            .enumerate()
            .map(|(j, (text, x))| Fragment::new(id * 10 + j, text, *x, y))
            .collect();
        let text = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        PhysicalRow {
            id,
            fragments,
            y_top: y,
            y_bottom: y,
            center_y: y,
            text,
            row_type: RowType::Totals,
        }
    }

    fn run(rows: Vec<PhysicalRow>) -> (TotalsSequence, AmountUsageTracker, Vec<String>) {
        let fragments: Vec<Fragment> =
            rows.iter().flat_map(|r| r.fragments.iter().cloned()).collect();
        let columns = detect_amount_columns(&fragments);
        let regions = Regions { totals: rows, ..Regions::default() };
        let mut tracker = AmountUsageTracker::new();
        let mut log = Vec::new();
        let seq = extract_totals(&regions, &columns, &mut tracker, &StoreConfig::default(), &mut log);
        (seq, tracker, log)
    }

    #[test]
    fn anchors_and_middle_amounts() {
        let rows = vec![
            row(0, &[("SUBTOTAL", 0.2), ("$20.00", 0.82)], 0.80),
            row(1, &[("State Sales Tax", 0.2), ("$0.91", 0.82)], 0.83),
            row(2, &[("Bottle Deposit", 0.2), ("$0.10", 0.82)], 0.86),
            row(3, &[("TOTAL", 0.2), ("$21.01", 0.82)], 0.89),
        ];
        let (seq, _, log) = run(rows);
        assert_eq!(seq.subtotal.unwrap().amount, Money::from_cents(2000));
        assert_eq!(seq.total.unwrap().amount, Money::from_cents(2101));
        assert_eq!(seq.middle.len(), 2);
        assert_eq!(seq.middle[0].label, "State Sales Tax");
        assert_eq!(seq.middle[1].amount, Money::from_cents(10));
        assert!(log.is_empty());
    }

    #[test]
    fn adjacent_anchors_leave_no_middle() {
        let rows = vec![
            row(0, &[("SUBTOTAL", 0.2), ("$20.49", 0.82)], 0.80),
            row(1, &[("TOTAL", 0.2), ("$20.49", 0.82)], 0.83),
        ];
        let (seq, tracker, _) = run(rows);
        assert_eq!(seq.subtotal.unwrap().amount, Money::from_cents(2049));
        assert_eq!(seq.total.unwrap().amount, Money::from_cents(2049));
        assert!(seq.middle.is_empty());
        assert_eq!(tracker.claimed_count(), 2);
    }

    #[test]
    fn sub_total_row_is_never_the_total() {
        let rows = vec![
            row(0, &[("SUB TOTAL", 0.2), ("$20.00", 0.82)], 0.80),
            row(1, &[("TOTAL", 0.2), ("$21.01", 0.82)], 0.89),
        ];
        let (seq, _, _) = run(rows);
        assert_eq!(seq.subtotal.unwrap().amount, Money::from_cents(2000));
        assert_eq!(seq.total.unwrap().amount, Money::from_cents(2101));
    }

    #[test]
    fn first_candidate_wins_and_second_is_logged() {
        let rows = vec![
            row(0, &[("SUBTOTAL", 0.2), ("$20.00", 0.82)], 0.80),
            row(1, &[("SUBTOTAL", 0.2), ("$19.00", 0.82)], 0.83),
            row(2, &[("TOTAL", 0.2), ("$21.00", 0.82)], 0.89),
        ];
        let (seq, _, log) = run(rows);
        assert_eq!(seq.subtotal.unwrap().amount, Money::from_cents(2000));
        assert!(log.iter().any(|e| e.contains("ambiguous subtotal")));
    }

    #[test]
    fn total_amount_on_next_row_is_healed() {
        let rows = vec![
            row(0, &[("SUBTOTAL", 0.2), ("$20.00", 0.82)], 0.80),
            row(1, &[("TOTAL", 0.2)], 0.88),
            row(2, &[("$20.00", 0.82)], 0.91),
        ];
        let (seq, _, _) = run(rows);
        let total = seq.total.unwrap();
        assert_eq!(total.amount, Money::from_cents(2000));
        // Anchored at the labelled row even though the amount came from below.
        assert_eq!(total.row_id, 1);
    }

    #[test]
    fn no_anchors_yields_empty_sequence() {
        let rows = vec![row(0, &[("THANK YOU", 0.3)], 0.9)];
        let (seq, tracker, _) = run(rows);
        assert!(seq.subtotal.is_none());
        assert!(seq.total.is_none());
        assert!(seq.middle.is_empty());
        assert_eq!(tracker.claimed_count(), 0);
    }
}
