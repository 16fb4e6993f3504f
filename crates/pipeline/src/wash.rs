use std::collections::BTreeMap;

use regex::Regex;
use tillscan_config::StoreConfig;
use tillscan_core::Fragment;
use tracing::debug;

/// Clear the amount flag on fragments matching the chain's exclusion
/// patterns (points balances, coupon codes, card suffixes) so no later
/// stage can mistake them for money.
pub fn wash_fragments(fragments: Vec<Fragment>, config: &StoreConfig) -> Vec<Fragment> {
    let patterns: Vec<Regex> = config
        .wash
        .amount_exclude_patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(r) => Some(r),
            Err(e) => {
                debug!(pattern = %p, error = %e, "invalid wash pattern skipped");
                None
            }
        })
        .collect();
    if patterns.is_empty() {
        return fragments;
    }

    fragments
        .into_iter()
        .map(|mut f| {
            if f.is_amount && patterns.iter().any(|rx| rx.is_match(&f.text)) {
                debug!(text = %f.text, "washed fragment; no longer an amount");
                f.is_amount = false;
                f.amount = None;
            }
            f
        })
        .collect()
}

/// Fragments sharing an identical bounding box are an upstream OCR defect
/// (two recognitions of the same region). Escalate to the error log so
/// downstream review sees them; the pipeline itself keeps going.
pub fn note_duplicate_bboxes(fragments: &[Fragment], error_log: &mut Vec<String>) {
    let mut seen: BTreeMap<(i64, i64, i64, i64), Vec<&str>> = BTreeMap::new();
    for f in fragments {
        let key = (
            micro(f.x),
            micro(f.y),
            micro(f.width.unwrap_or(0.0)),
            micro(f.height.unwrap_or(0.0)),
        );
        seen.entry(key).or_default().push(f.text.as_str());
    }
    for texts in seen.values() {
        if texts.len() > 1 {
            let mut unique: Vec<&str> = Vec::new();
            for t in texts {
                if !unique.contains(t) {
                    unique.push(t);
                }
            }
            error_log.push(format!("duplicate bounding box for fragments: {unique:?}"));
        }
    }
}

fn micro(v: f64) -> i64 {
    (v * 1_000_000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wash_clears_matching_amounts() {
        let mut cfg = StoreConfig::default();
        cfg.wash.amount_exclude_patterns = vec![r"(?i)^SC-\d".to_string()];
        let frags = vec![
            Fragment::new(0, "SC-1 $0.30", 0.3, 0.4),
            Fragment::new(1, "$4.99", 0.8, 0.4),
        ];
        let out = wash_fragments(frags, &cfg);
        assert!(!out[0].is_amount);
        assert!(out[0].amount.is_none());
        assert!(out[1].is_amount);
    }

    #[test]
    fn invalid_pattern_is_skipped_not_fatal() {
        let mut cfg = StoreConfig::default();
        cfg.wash.amount_exclude_patterns = vec!["(unclosed".to_string()];
        let frags = vec![Fragment::new(0, "$4.99", 0.8, 0.4)];
        let out = wash_fragments(frags, &cfg);
        assert!(out[0].is_amount);
    }

    #[test]
    fn duplicate_bboxes_are_reported() {
        let mut a = Fragment::new(0, "JAPANESE SWEET POTATO", 0.3, 0.4);
        let mut b = Fragment::new(1, "/lb", 0.3, 0.4);
        a.width = Some(0.2);
        a.height = Some(0.01);
        b.width = Some(0.2);
        b.height = Some(0.01);
        b.x = a.x;
        b.y = a.y;
        let mut log = Vec::new();
        note_duplicate_bboxes(&[a, b], &mut log);
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("JAPANESE SWEET POTATO"));
    }

    #[test]
    fn distinct_bboxes_stay_quiet() {
        let frags = vec![
            Fragment::new(0, "A", 0.1, 0.2),
            Fragment::new(1, "B", 0.1, 0.3),
        ];
        let mut log = Vec::new();
        note_duplicate_bboxes(&frags, &mut log);
        assert!(log.is_empty());
    }
}
