use std::collections::BTreeMap;

use tillscan_core::{AmountColumn, AmountColumns, Fragment};
use tracing::{debug, warn};

/// Histogram bin width: 1% of page width.
const BIN_SIZE: f64 = 0.01;
/// Minimum cluster population for a bin to count as a column.
const MIN_PEAK_COUNT: usize = 3;

/// Find the dominant amount column(s) from a positional histogram of the
/// amount fragments. The rightmost strong cluster wins — amounts are
/// right-aligned, and this avoids anchoring on a possibly mis-detected
/// subtotal position.
pub fn detect_amount_columns(fragments: &[Fragment]) -> AmountColumns {
    let amounts: Vec<&Fragment> = fragments
        .iter()
        .filter(|f| f.is_amount && f.amount.is_some())
        .collect();

    if amounts.is_empty() {
        warn!("no amount fragments; using low-confidence default column");
        let main = AmountColumn { x: 0.5, tolerance: 0.1, confidence: 0.0, count: 0 };
        return AmountColumns { main, all: vec![main] };
    }

    let mut histogram: BTreeMap<i64, usize> = BTreeMap::new();
    for f in &amounts {
        *histogram.entry(bin_index(f.center_x)).or_insert(0) += 1;
    }

    let peak_bins = find_peaks(&histogram);
    if peak_bins.is_empty() {
        // Sparse receipt: fall back to the rightmost amount.
        let rightmost = amounts
            .iter()
            .map(|f| f.center_x)
            .fold(f64::NEG_INFINITY, f64::max);
        debug!(x = rightmost, "no histogram peak; falling back to rightmost amount");
        let main = AmountColumn {
            x: rightmost,
            tolerance: BIN_SIZE * 2.0,
            confidence: 0.5,
            count: amounts.len(),
        };
        return AmountColumns { main, all: vec![main] };
    }

    let max_count = peak_bins.iter().map(|(_, c)| *c).max().unwrap_or(1);
    let all: Vec<AmountColumn> = peak_bins
        .iter()
        .map(|(bin, count)| column_from_bin(*bin, *count, max_count, &amounts))
        .collect();
    // Peaks come out of the BTreeMap left to right; the last is rightmost.
    let main = *all.last().unwrap_or(&all[0]);

    debug!(
        x = main.x,
        tolerance = main.tolerance,
        count = main.count,
        columns = all.len(),
        "detected amount columns"
    );
    AmountColumns { main, all }
}

fn bin_index(x: f64) -> i64 {
    (x / BIN_SIZE).round() as i64
}

/// Local maxima with enough members. Only spatially adjacent bins compete;
/// distant clusters are independent peaks. Plateau bins lose to neither
/// side and are dropped, matching the fallback path for degenerate layouts.
fn find_peaks(histogram: &BTreeMap<i64, usize>) -> Vec<(i64, usize)> {
    let mut peaks = Vec::new();
    for (bin, count) in histogram {
        if *count < MIN_PEAK_COUNT {
            continue;
        }
        if histogram.get(&(bin - 1)).is_some_and(|left| *left >= *count) {
            continue;
        }
        if histogram.get(&(bin + 1)).is_some_and(|right| *right >= *count) {
            continue;
        }
        peaks.push((*bin, *count));
    }
    peaks
}

fn column_from_bin(
    bin: i64,
    count: usize,
    max_count: usize,
    amounts: &[&Fragment],
) -> AmountColumn {
    let center = bin as f64 * BIN_SIZE;
    // Tolerance is the widest member deviation, floored at one bin so a
    // perfectly aligned column still accepts its own members.
    let deviation = amounts
        .iter()
        .filter(|f| bin_index(f.center_x) == bin)
        .map(|f| (f.center_x - center).abs())
        .fold(0.0f64, f64::max);
    AmountColumn {
        x: center,
        tolerance: deviation.max(BIN_SIZE),
        confidence: count as f64 / max_count as f64,
        count,
    }
}
