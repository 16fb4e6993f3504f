use std::sync::OnceLock;

use rust_decimal::Decimal;
use tillscan_config::StoreConfig;
use tillscan_core::{AmountRole, AmountUsageTracker, FeeKind, LabeledAmount, Money, TotalsSequence};
use tillscan_match::{squash, LabelMatcher};
use tracing::{debug, info, warn};

const TAX_LABELS: &[&str] = &[
    "Tax", "Sales Tax", "State Sales Tax", "Total Tax", "VAT", "GST", "HST", "PST",
];
const FEE_LABELS: &[&str] = &[
    "Bottle Deposit",
    "Environmental Fee",
    "Env Fee",
    "Environment Fee",
    "Deposit",
    "CRF",
    "Recycling Fee",
    "Bag Fee",
];

/// Strict threshold for tax labels — misreading a fee as tax skews the
/// aggregate check asymmetrically.
const TAX_THRESHOLD: f64 = 0.85;
/// Relaxed threshold for fee labels: these amounts already sit between
/// the subtotal and total with money on the right, so a weaker textual
/// match is acceptable.
const FEE_THRESHOLD: f64 = 0.60;

fn tax_matcher() -> &'static LabelMatcher {
    static M: OnceLock<LabelMatcher> = OnceLock::new();
    M.get_or_init(|| LabelMatcher::new(TAX_LABELS.iter().copied(), TAX_THRESHOLD))
}

fn fee_matcher() -> &'static LabelMatcher {
    static M: OnceLock<LabelMatcher> = OnceLock::new();
    M.get_or_init(|| LabelMatcher::new(FEE_LABELS.iter().copied(), FEE_THRESHOLD))
}

/// Middle amounts split into taxes and fees. `Generic` entries land in
/// `fees` — summing them there keeps the aggregate identity intact even
/// when the label is unreadable.
#[derive(Debug, Default)]
pub struct ClassifiedTotals {
    pub taxes: Vec<LabeledAmount>,
    pub fees: Vec<LabeledAmount>,
    pub tax_total: Money,
}

/// Classify a label as tax, fee, or generic.
pub fn classify_label(text: &str) -> (FeeKind, Option<String>) {
    if let Some((label, score)) = tax_matcher().best(text) {
        debug!(%text, label, score, "tax label match");
        return (FeeKind::Tax, Some(label.to_string()));
    }
    if let Some((label, score)) = fee_matcher().best(text) {
        debug!(%text, label, score, "fee label match");
        return (FeeKind::Fee, Some(label.to_string()));
    }

    // Keyword fallback for labels too mangled to score.
    let sq = squash(text);
    if ["TAX", "VAT", "GST", "HST", "PST"].iter().any(|k| sq.contains(k)) || text.contains('%') {
        return (FeeKind::Tax, None);
    }
    if ["FEE", "BOTTLE", "DEPOSIT", "CRF", "ENVIRONMENT"].iter().any(|k| sq.contains(k)) {
        return (FeeKind::Fee, None);
    }
    (FeeKind::Generic, None)
}

/// Label each middle amount, claim its fragment, and apply the sanity
/// guard: a "tax" above the configured fraction of the subtotal is a
/// misread label, so it is demoted to a fee and flagged for review.
pub fn classify_middle_amounts(
    sequence: &TotalsSequence,
    tracker: &mut AmountUsageTracker,
    config: &StoreConfig,
    error_log: &mut Vec<String>,
) -> ClassifiedTotals {
    let mut result = ClassifiedTotals::default();

    for candidate in &sequence.middle {
        if tracker.is_used_id(candidate.fragment_id) {
            continue;
        }
        let (kind, normalized) = classify_label(&candidate.label);
        let label = normalized.unwrap_or_else(|| candidate.label.clone());
        let entry = LabeledAmount { label, amount: candidate.amount };

        match kind {
            FeeKind::Tax => {
                tracker.claim_id(candidate.fragment_id, AmountRole::Tax);
                info!(label = %entry.label, amount = %entry.amount, "classified tax");
                result.taxes.push(entry);
            }
            FeeKind::Fee => {
                tracker.claim_id(candidate.fragment_id, AmountRole::Fee);
                info!(label = %entry.label, amount = %entry.amount, "classified fee");
                result.fees.push(entry);
            }
            FeeKind::Generic => {
                tracker.claim_id(candidate.fragment_id, AmountRole::Fee);
                warn!(label = %entry.label, amount = %entry.amount, "unclassified middle amount treated as fee");
                result.fees.push(entry);
            }
        }
    }

    result.tax_total = result.taxes.iter().map(|t| t.amount).sum();

    if let Some(subtotal) = sequence.subtotal {
        let max_ratio = Decimal::try_from(config.checks.max_tax_ratio).unwrap_or_else(|_| {
            Decimal::new(20, 2)
        });
        let over_limit = result
            .tax_total
            .ratio_of(subtotal.amount)
            .is_some_and(|ratio| ratio > max_ratio);
        if !result.tax_total.is_zero() && over_limit {
            error_log.push(format!(
                "tax {} exceeds {}% of subtotal {}; reclassified as fee for review",
                result.tax_total,
                config.checks.max_tax_ratio * 100.0,
                subtotal.amount
            ));
            warn!(tax = %result.tax_total, subtotal = %subtotal.amount, "tax fraction implausible; demoting to fees");
            for tax in result.taxes.drain(..) {
                result.fees.push(LabeledAmount {
                    label: format!("{} (review)", tax.label),
                    amount: tax.amount,
                });
            }
            result.tax_total = Money::zero();
        }
    }

    result
}
