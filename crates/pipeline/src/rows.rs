use std::collections::BTreeMap;

use tillscan_core::{Fragment, PhysicalRow, RowType};
use tracing::debug;

/// Fixed Y tolerance used when no height information is available.
/// Small on purpose: merging adjacent printed lines loses items, while a
/// split line is usually recoverable downstream.
pub const DEFAULT_ROW_EPS: f64 = 0.0025;
/// Per-fragment tolerance cap, as a multiple of the typical fragment
/// height. 0.5 = half a line: left and right ends of one printed line may
/// merge, two stacked lines may not.
const MAX_EPS_HEIGHT_FACTOR: f64 = 0.5;
const FALLBACK_FRAGMENT_HEIGHT: f64 = 0.02;
const FALLBACK_HALF_LINE: f64 = 0.006;

/// Typical fragment height, from the first ten fragments: bucket heights
/// by 0.001, take the mode bucket, and average it. Robust against the odd
/// oversized logo block.
pub fn typical_fragment_height(fragments: &[Fragment]) -> f64 {
    let mut heights = Vec::new();
    for f in fragments.iter().take(10) {
        match f.height {
            Some(h) if h > 0.0 => heights.push(h),
            _ if f.center_y > f.y => heights.push(2.0 * (f.center_y - f.y)),
            _ => {}
        }
    }
    if heights.is_empty() {
        return FALLBACK_FRAGMENT_HEIGHT;
    }
    let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for h in &heights {
        buckets.entry((h * 1000.0).round() as i64).or_default().push(*h);
    }
    let mode = buckets
        .iter()
        .max_by(|a, b| a.1.len().cmp(&b.1.len()).then(b.0.cmp(a.0)))
        .map(|(_, v)| v);
    match mode {
        Some(v) => v.iter().sum::<f64>() / v.len() as f64,
        None => FALLBACK_FRAGMENT_HEIGHT,
    }
}

/// Half of the average fragment height across the whole receipt — the Y
/// tolerance used when pairing names and quantity lines with amounts.
pub fn half_line_tolerance(fragments: &[Fragment]) -> f64 {
    let heights: Vec<f64> = fragments
        .iter()
        .filter_map(|f| f.height)
        .filter(|h| *h > 0.0)
        .collect();
    if heights.is_empty() {
        return FALLBACK_HALF_LINE;
    }
    heights.iter().sum::<f64>() / heights.len() as f64 * 0.5
}

/// Cluster fragments into physical rows with a per-fragment tolerance
/// derived from fragment height, capped at half the typical line height.
pub fn build_rows(fragments: &[Fragment]) -> Vec<PhysicalRow> {
    let max_eps = typical_fragment_height(fragments) * MAX_EPS_HEIGHT_FACTOR;
    cluster(fragments, |anchor, frag| {
        fragment_eps(anchor, max_eps).max(fragment_eps(frag, max_eps))
    })
}

/// Cluster with a fixed Y tolerance.
pub fn build_rows_with_eps(fragments: &[Fragment], eps: f64) -> Vec<PhysicalRow> {
    cluster(fragments, |_, _| eps)
}

fn cluster<F>(fragments: &[Fragment], eps_for: F) -> Vec<PhysicalRow>
where
    F: Fn(&Fragment, &Fragment) -> f64,
{
    if fragments.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<&Fragment> = fragments.iter().collect();
    sorted.sort_by(|a, b| a.center_y.total_cmp(&b.center_y));

    let mut rows = Vec::new();
    let mut current: Vec<&Fragment> = vec![sorted[0]];

    for frag in &sorted[1..] {
        // Compare against the FIRST fragment of the open row, not the
        // last; comparing with the last lets fragments chain-merge far
        // past the row's real extent.
        let anchor = current[0];
        let eps = eps_for(anchor, frag);
        if (frag.center_y - anchor.center_y).abs() <= eps {
            current.push(frag);
        } else {
            rows.push(finish_row(&current, rows.len()));
            current = vec![frag];
        }
    }
    rows.push(finish_row(&current, rows.len()));

    debug!(rows = rows.len(), fragments = fragments.len(), "reconstructed physical rows");
    rows
}

fn fragment_eps(f: &Fragment, max_eps: f64) -> f64 {
    let half = match f.height {
        Some(h) if h > 0.0 => h / 2.0,
        _ if f.center_y > f.y => f.center_y - f.y,
        _ => DEFAULT_ROW_EPS,
    };
    half.max(DEFAULT_ROW_EPS).min(max_eps)
}

fn finish_row(members: &[&Fragment], id: usize) -> PhysicalRow {
    let mut fragments: Vec<Fragment> = members.iter().map(|f| (*f).clone()).collect();
    fragments.sort_by(|a, b| a.x.total_cmp(&b.x));

    let y_top = fragments.iter().map(|f| f.y).fold(f64::INFINITY, f64::min);
    let y_bottom = fragments
        .iter()
        .map(|f| f.center_y)
        .fold(f64::NEG_INFINITY, f64::max);
    let text = fragments
        .iter()
        .map(|f| f.text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    PhysicalRow {
        id,
        fragments,
        y_top,
        y_bottom,
        center_y: (y_top + y_bottom) / 2.0,
        text,
        row_type: RowType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(id: usize, text: &str, x: f64, y: f64) -> Fragment {
        Fragment::new(id, text, x, y)
    }

    #[test]
    fn empty_input_empty_output() {
        assert!(build_rows(&[]).is_empty());
    }

    #[test]
    fn same_band_fragments_share_a_row() {
        let frags = vec![
            frag(0, "MILK", 0.2, 0.5001),
            frag(1, "$4.99", 0.8, 0.5019),
            frag(2, "BREAD", 0.2, 0.5401),
        ];
        let rows = build_rows_with_eps(&frags, DEFAULT_ROW_EPS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "MILK $4.99");
        assert_eq!(rows[1].text, "BREAD");
    }

    #[test]
    fn no_chain_merging_past_the_anchor() {
        // Each neighbour is within eps of the previous fragment, but the
        // third is beyond eps of the row anchor and must split off.
        let frags = vec![
            frag(0, "A", 0.1, 0.5000),
            frag(1, "B", 0.3, 0.5024),
            frag(2, "C", 0.5, 0.5048),
        ];
        let rows = build_rows_with_eps(&frags, DEFAULT_ROW_EPS);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fragments.len(), 2);
        assert_eq!(rows[1].fragments.len(), 1);
    }

    #[test]
    fn rows_come_out_top_to_bottom_and_left_to_right() {
        let frags = vec![
            frag(0, "$5.99", 0.8, 0.70),
            frag(1, "RICE", 0.2, 0.70),
            frag(2, "TOP", 0.2, 0.10),
        ];
        let rows = build_rows(&frags);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].text, "TOP");
        assert_eq!(rows[1].text, "RICE $5.99");
    }

    #[test]
    fn taller_fragments_widen_the_tolerance() {
        let mut a = frag(0, "LEFT", 0.1, 0.500);
        let mut b = frag(1, "RIGHT", 0.8, 0.508);
        // Half of 0.02 = 0.01 tolerance, so a 0.008 offset still merges.
        a.height = Some(0.02);
        b.height = Some(0.02);
        let rows = build_rows(&[a, b]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn typical_height_ignores_outliers() {
        let mut frags: Vec<Fragment> = (0..6)
            .map(|i| {
                let mut f = frag(i, "x", 0.1, 0.1 + i as f64 * 0.05);
                f.height = Some(0.012);
                f
            })
            .collect();
        let mut logo = frag(9, "LOGO", 0.5, 0.02);
        logo.height = Some(0.2);
        frags.push(logo);
        let h = typical_fragment_height(&frags);
        assert!((h - 0.012).abs() < 1e-9, "got {h}");
    }

    #[test]
    fn half_line_tolerance_falls_back_without_heights() {
        let frags = vec![frag(0, "x", 0.1, 0.1)];
        assert!((half_line_tolerance(&frags) - 0.006).abs() < 1e-12);
    }
}
