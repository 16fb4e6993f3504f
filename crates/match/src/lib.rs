pub mod distance;
pub mod metrics;
pub mod scorer;

pub use distance::{lcs_len, levenshtein, within_one_edit};
pub use metrics::{contains_marker, fold_for_match, normalize, squash, visual_fold};
pub use scorer::{combined_score, LabelMatcher, ScoredLabel};
