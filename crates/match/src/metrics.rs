use std::collections::HashSet;

use crate::distance::{lcs_len, levenshtein};

/// Lowercase, strip punctuation to spaces, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for ch in text.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Map characters OCR habitually confuses onto their letter look-alikes
/// (`0`→`o`, `1`→`l`, `5`→`s`, `7`→`t`, `$`→`s`, `@`→`a`).
pub fn visual_fold(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '0' => 'o',
            '1' => 'l',
            '5' => 's',
            '7' => 't',
            '$' => 's',
            '@' => 'a',
            other => other,
        })
        .collect()
}

/// Full preprocessing for similarity scoring: normalize then fold.
pub fn fold_for_match(text: &str) -> String {
    visual_fold(&normalize(text))
}

/// Squash a marker for substring containment: uppercase, drop spaces,
/// dots, dashes and underscores. `"SUB TOTAL"` and `"Sub-Total"` both
/// squash to `SUBTOTAL`.
pub fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '.' | '-' | '_'))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// True if the squashed text contains any squashed marker.
pub fn contains_marker(text: &str, markers: &[String]) -> bool {
    let hay = squash(text);
    markers.iter().any(|m| {
        let needle = squash(m);
        !needle.is_empty() && hay.contains(&needle)
    })
}

/// Consonant skeleton: vowels out, consecutive duplicates collapsed,
/// non-alphanumerics dropped. `"bottle"` and `"bot le"` share `btl`.
pub fn skeleton(text: &str) -> String {
    let mut out = String::new();
    let mut last = None;
    for ch in text.chars() {
        if matches!(ch, 'a' | 'e' | 'i' | 'o' | 'u') || !ch.is_ascii_alphanumeric() {
            continue;
        }
        if last == Some(ch) {
            continue;
        }
        out.push(ch);
        last = Some(ch);
    }
    out
}

pub fn levenshtein_sim(a: &str, b: &str) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

pub fn lcs_sim(a: &str, b: &str) -> f64 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    lcs_len(a, b) as f64 / max_len as f64
}

pub fn skeleton_sim(a: &str, b: &str) -> f64 {
    levenshtein_sim(&skeleton(a), &skeleton(b))
}

/// Jaccard overlap of whitespace tokens.
pub fn token_overlap_sim(a: &str, b: &str) -> f64 {
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    inter as f64 / union as f64
}

/// Jaccard overlap of character trigrams (spaces removed).
pub fn trigram_sim(a: &str, b: &str) -> f64 {
    let ga = trigrams(a);
    let gb = trigrams(b);
    if ga.is_empty() || gb.is_empty() {
        return 0.0;
    }
    let inter = ga.intersection(&gb).count();
    let union = ga.union(&gb).count();
    inter as f64 / union as f64
}

fn trigrams(text: &str) -> HashSet<String> {
    let t: String = text.chars().filter(|c| *c != ' ').collect();
    let chars: Vec<char> = t.chars().collect();
    if chars.is_empty() {
        return HashSet::new();
    }
    if chars.len() < 3 {
        let mut set = HashSet::new();
        set.insert(t);
        return set;
    }
    chars.windows(3).map(|w| w.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("Env.ronment  fee!"), "env ronment fee");
        assert_eq!(normalize("  TAX  "), "tax");
    }

    #[test]
    fn visual_fold_maps_confusables() {
        assert_eq!(visual_fold("b0t1e"), "botle");
        assert_eq!(visual_fold("5ale5 7ax"), "sales tax");
    }

    #[test]
    fn squash_variants_collapse() {
        assert_eq!(squash("SUB TOTAL"), "SUBTOTAL");
        assert_eq!(squash("Sub-Total"), "SUBTOTAL");
        assert_eq!(squash("sub_total."), "SUBTOTAL");
    }

    #[test]
    fn contains_marker_is_squashed_substring() {
        let markers = vec!["SUB TOTAL".to_string()];
        assert!(contains_marker("SUBTOTAL $20.49", &markers));
        assert!(contains_marker("Sub total", &markers));
        assert!(!contains_marker("TOTAL $20.49", &markers));
    }

    #[test]
    fn skeleton_drops_vowels_and_dupes() {
        assert_eq!(skeleton("bottle"), "btl");
        assert_eq!(skeleton("bot le"), "btl");
    }

    #[test]
    fn identical_strings_max_out_metrics() {
        assert_eq!(levenshtein_sim("tax", "tax"), 1.0);
        assert_eq!(lcs_sim("tax", "tax"), 1.0);
        assert_eq!(token_overlap_sim("sales tax", "sales tax"), 1.0);
        assert_eq!(trigram_sim("sales tax", "sales tax"), 1.0);
    }

    #[test]
    fn disjoint_strings_bottom_out() {
        assert_eq!(token_overlap_sim("tax", "deposit"), 0.0);
        assert_eq!(trigram_sim("abc", "xyz"), 0.0);
    }
}
