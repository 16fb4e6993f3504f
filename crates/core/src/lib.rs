pub mod error;
pub mod fragment;
pub mod item;
pub mod money;
pub mod result;
pub mod row;
pub mod tracker;

pub use error::ParseError;
pub use fragment::{sniff_amount, Fragment};
pub use item::{
    ExtractedItem, FeeKind, LabeledAmount, MiddleCandidate, TotalsAnchor, TotalsSequence,
};
pub use money::Money;
pub use result::{AggregateCheck, ParseResult, RowCheck, TotalsBlock, ValidationReport};
pub use row::{AmountColumn, AmountColumns, PhysicalRow, RowType};
pub use tracker::{AmountRole, AmountUsageTracker};
