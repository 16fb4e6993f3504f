use regex::Regex;
use tillscan_config::StoreConfig;
use tillscan_core::Fragment;
use tracing::{debug, info, warn};

use crate::rows::half_line_tolerance;

/// Corrections steeper than ~5 degrees are treated as misdetected
/// reference lines, not real skew.
const MAX_SKEW_RADIANS: f64 = 0.0873;
/// Reference endpoints closer than this carry too little leverage to
/// estimate an angle.
const MIN_REF_SPAN: f64 = 0.05;
/// Minimum Y band when gathering the reference line; skewed originals
/// spread one printed line across more than a line height.
const MIN_LINE_BAND: f64 = 0.04;

/// Rotate fragment coordinates so the configured reference line (a line
/// the printer always emits horizontally, e.g. timestamp + operator)
/// becomes horizontal. Returns the input unchanged when the reference is
/// absent or the computed angle is implausible — an uncertain correction
/// is never applied.
pub fn correct_skew(
    fragments: Vec<Fragment>,
    config: &StoreConfig,
    error_log: &mut Vec<String>,
) -> Vec<Fragment> {
    let Some(pattern) = config.skew.reference_pattern.as_deref() else {
        return fragments;
    };
    let regex = match Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => {
            warn!(pattern, error = %e, "invalid skew reference pattern; skipping correction");
            return fragments;
        }
    };

    let line_band = (half_line_tolerance(&fragments) * 2.0).max(MIN_LINE_BAND);
    let Some(anchor) = fragments
        .iter()
        .filter(|f| regex.is_match(&f.text))
        .min_by(|a, b| a.center_y.total_cmp(&b.center_y))
    else {
        debug!("skew reference line not found; skipping correction");
        return fragments;
    };

    // The reference line: everything within the band around the anchor.
    let anchor_y = anchor.center_y;
    let line: Vec<&Fragment> = fragments
        .iter()
        .filter(|f| (f.center_y - anchor_y).abs() <= line_band)
        .collect();
    let Some(left) = line.iter().min_by(|a, b| a.center_x.total_cmp(&b.center_x)) else {
        return fragments;
    };
    let Some(right) = line.iter().max_by(|a, b| a.center_x.total_cmp(&b.center_x)) else {
        return fragments;
    };

    let dx = right.center_x - left.center_x;
    let dy = right.center_y - left.center_y;
    if dx < MIN_REF_SPAN {
        debug!(span = dx, "skew reference span too small; skipping correction");
        return fragments;
    }

    let angle = dy.atan2(dx);
    if angle.abs() > MAX_SKEW_RADIANS {
        error_log.push(format!(
            "skew correction skipped: reference angle {angle:.4} rad exceeds plausibility bound"
        ));
        warn!(angle, "implausible skew angle; leaving coordinates untouched");
        return fragments;
    }
    if angle == 0.0 {
        return fragments;
    }

    let (origin_x, origin_y) = (left.center_x, left.center_y);
    let (sin, cos) = angle.sin_cos();
    info!(angle, origin_x, origin_y, "applying skew correction");

    fragments
        .into_iter()
        .map(|mut f| {
            let rotate = |x: f64, y: f64| {
                let (dx, dy) = (x - origin_x, y - origin_y);
                (origin_x + dx * cos + dy * sin, origin_y - dx * sin + dy * cos)
            };
            let (cx, cy) = rotate(f.center_x, f.center_y);
            let (x, y) = rotate(f.x, f.y);
            f.center_x = cx;
            f.center_y = cy;
            f.x = x;
            f.y = y;
            f
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATETIME_PATTERN: &str = r"\d{2}/\d{2}/\d{2}\s+\d{1,2}:\d{2}:\d{2}\s*[AP]M";

    fn config_with_reference() -> StoreConfig {
        let mut cfg = StoreConfig::default();
        cfg.skew.reference_pattern = Some(DATETIME_PATTERN.to_string());
        cfg
    }

    #[test]
    fn no_reference_pattern_is_a_no_op() {
        let frags = vec![Fragment::new(0, "MILK", 0.2, 0.5)];
        let mut log = Vec::new();
        let out = correct_skew(frags.clone(), &StoreConfig::default(), &mut log);
        assert_eq!(out[0].center_y, frags[0].center_y);
        assert!(log.is_empty());
    }

    #[test]
    fn reference_line_becomes_horizontal() {
        let frags = vec![
            Fragment::new(0, "01/10/26 1:45:58 PM", 0.10, 0.300),
            Fragment::new(1, "MeiChen", 0.80, 0.330),
            Fragment::new(2, "PEAR", 0.20, 0.550),
        ];
        let mut log = Vec::new();
        let out = correct_skew(frags, &config_with_reference(), &mut log);
        assert!(log.is_empty());
        // The right end of the reference line rotates onto the left end's Y.
        assert!((out[1].center_y - out[0].center_y).abs() < 1e-9);
        // Fragments elsewhere move too, consistently with the rotation.
        assert!((out[2].center_y - 0.550).abs() < 0.02);
    }

    #[test]
    fn missing_reference_leaves_input_unchanged() {
        let frags = vec![Fragment::new(0, "NO DATES HERE", 0.2, 0.5)];
        let mut log = Vec::new();
        let out = correct_skew(frags.clone(), &config_with_reference(), &mut log);
        assert_eq!(out[0].center_y, frags[0].center_y);
    }

    #[test]
    fn implausible_angle_is_refused_and_logged() {
        let frags = vec![
            Fragment::new(0, "01/10/26 1:45:58 PM", 0.10, 0.30),
            // 0.04 rise over 0.06 run is far past the plausibility bound.
            Fragment::new(1, "MeiChen", 0.16, 0.34),
        ];
        let mut log = Vec::new();
        let out = correct_skew(frags.clone(), &config_with_reference(), &mut log);
        assert_eq!(out[0].center_y, frags[0].center_y);
        assert_eq!(out[1].center_y, frags[1].center_y);
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("skew"));
    }

    #[test]
    fn narrow_span_is_not_trusted() {
        let frags = vec![Fragment::new(0, "01/10/26 1:45:58 PM", 0.10, 0.30)];
        let mut log = Vec::new();
        let out = correct_skew(frags.clone(), &config_with_reference(), &mut log);
        assert_eq!(out[0].center_y, frags[0].center_y);
        assert!(log.is_empty());
    }
}
