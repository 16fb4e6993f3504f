use tillscan_config::StoreConfig;
use tillscan_core::{
    AmountUsageTracker, Fragment, ParseError, ParseResult, TotalsBlock,
};
use tracing::{info, instrument};

use crate::{classify, columns, header, items, regions, rows, skew, totals, validate, wash};

/// Reconstruct a structured receipt from unordered OCR fragments.
///
/// Pure and synchronous: the result depends only on the fragments and the
/// config snapshot. Concurrent receipts need no coordination — each call
/// owns its usage tracker. Malformed *data* never errors; only
/// structurally meaningless input (nothing extractable) returns `Err`.
pub fn parse_receipt(
    fragments: Vec<Fragment>,
    config: Option<&StoreConfig>,
) -> Result<ParseResult, ParseError> {
    run(fragments, config).map(|(result, _)| result)
}

/// Pipeline body; also hands back the usage tracker so tests can audit
/// the no-double-use invariant.
#[instrument(skip_all, fields(fragments = fragments.len()))]
pub(crate) fn run(
    fragments: Vec<Fragment>,
    config: Option<&StoreConfig>,
) -> Result<(ParseResult, AmountUsageTracker), ParseError> {
    if fragments.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let default_config = StoreConfig::default();
    let config = config.unwrap_or(&default_config);
    let mut error_log: Vec<String> = Vec::new();

    let normalized: Vec<Fragment> = fragments
        .into_iter()
        .enumerate()
        .map(|(i, f)| f.normalized(i))
        .collect();
    // Passthrough snapshot before any stage touches geometry or flags.
    let ocr_fragments: Vec<Fragment> = normalized.iter().map(|f| f.rounded()).collect();

    let washed = wash::wash_fragments(normalized, config);
    wash::note_duplicate_bboxes(&washed, &mut error_log);
    let corrected = skew::correct_skew(washed, config, &mut error_log);

    let physical_rows = rows::build_rows(&corrected);
    let amount_columns = columns::detect_amount_columns(&corrected);
    let split = regions::split_regions(physical_rows, config);
    if split.items.is_empty() {
        return Err(ParseError::NoItemRows);
    }

    let mut tracker = AmountUsageTracker::new();
    let extraction =
        items::extract_items(&split, &amount_columns, &mut tracker, config, &mut error_log);
    let sequence =
        totals::extract_totals(&split, &amount_columns, &mut tracker, config, &mut error_log);
    if sequence.subtotal.is_none() && sequence.total.is_none() {
        return Err(ParseError::NoTotalsAnchor);
    }

    let classified =
        classify::classify_middle_amounts(&sequence, &mut tracker, config, &mut error_log);
    let mut fees = classified.fees;
    fees.extend(extraction.fees.iter().cloned());

    let validation = validate::validate(
        &extraction.items,
        &sequence,
        classified.tax_total,
        &fees,
        &extraction.fees,
        config,
    );
    let (store, purchase_time) = header::extract_header_metadata(&split, config);

    let result = ParseResult {
        success: validation.passed,
        chain_id: if config.chain_id.is_empty() { None } else { Some(config.chain_id.clone()) },
        store,
        purchase_time,
        membership: split.membership.clone(),
        items: extraction.items,
        totals: TotalsBlock {
            subtotal: sequence.subtotal.map(|a| a.amount),
            tax: classified.tax_total,
            fees,
            total: sequence.total.map(|a| a.amount),
        },
        validation,
        error_log,
        ocr_fragments,
    };
    info!(
        success = result.success,
        items = result.items.len(),
        errors = result.error_log.len(),
        "parse complete"
    );
    Ok((result, tracker))
}
