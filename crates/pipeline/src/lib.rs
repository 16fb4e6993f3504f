pub mod classify;
pub mod columns;
pub mod header;
pub mod items;
pub mod pipeline;
pub mod regions;
pub mod rows;
pub mod skew;
pub mod totals;
pub mod validate;
pub mod wash;

pub use classify::{classify_label, classify_middle_amounts, ClassifiedTotals};
pub use columns::detect_amount_columns;
pub use items::{extract_items, ItemExtraction};
pub use pipeline::parse_receipt;
pub use regions::{split_regions, Regions};
pub use rows::{build_rows, build_rows_with_eps};
pub use skew::correct_skew;
pub use totals::extract_totals;
pub use validate::validate;
