use tillscan_config::StoreConfig;
use tillscan_core::{
    AggregateCheck, ExtractedItem, LabeledAmount, Money, RowCheck, TotalsSequence, ValidationReport,
};
use tracing::{debug, warn};

/// Row-level and aggregate numeric checks. A failure never discards the
/// extraction — it is reported with the mismatching rows and aggregates
/// so downstream review gets the full picture.
pub fn validate(
    items: &[ExtractedItem],
    sequence: &TotalsSequence,
    tax_total: Money,
    fees: &[LabeledAmount],
    item_region_fees: &[LabeledAmount],
    config: &StoreConfig,
) -> ValidationReport {
    let row_tol = Money::from_cents(config.checks.row_tolerance_cents);
    let agg_tol = Money::from_cents(config.checks.aggregate_tolerance_cents);

    let mut report = ValidationReport::default();

    for item in items {
        let (Some(qty), Some(unit_price)) = (item.quantity, item.unit_price) else {
            continue;
        };
        let calculated = unit_price.mul_qty(qty);
        // Package-discount items diverge from per-unit arithmetic by
        // design; record the row but keep it out of the verdict.
        let skipped = item.on_sale;
        let passed = skipped || calculated.abs_diff(item.line_total) <= row_tol;
        if !passed {
            warn!(
                product = %item.product_name,
                %calculated,
                expected = %item.line_total,
                "row math mismatch"
            );
        }
        report.row_checks.push(RowCheck {
            product_name: item.product_name.clone(),
            calculated,
            expected: item.line_total,
            passed,
            skipped,
        });
    }

    let items_sum: Money = items.iter().map(|i| i.line_total).sum();
    let fees_sum: Money = fees.iter().map(|f| f.amount).sum();

    match (sequence.subtotal, sequence.total) {
        (Some(subtotal), total) => {
            report.aggregate_checks.push(aggregate_check(
                "items_sum_vs_subtotal",
                items_sum,
                subtotal.amount,
                agg_tol,
            ));
            if let Some(total) = total {
                let ladder = subtotal.amount + fees_sum + tax_total;
                report.aggregate_checks.push(aggregate_check(
                    "subtotal_plus_charges_vs_total",
                    ladder,
                    total.amount,
                    agg_tol,
                ));
            }
        }
        (None, Some(total)) => {
            // Grocery layout: no subtotal printed, items (plus any fee
            // rows inside the items region) must reach the total.
            let item_fees_sum: Money = item_region_fees.iter().map(|f| f.amount).sum();
            report.aggregate_checks.push(aggregate_check(
                "items_sum_vs_total",
                items_sum + item_fees_sum,
                total.amount,
                agg_tol,
            ));
        }
        (None, None) => {}
    }

    report.passed = report.row_checks.iter().all(|c| c.passed)
        && report.aggregate_checks.iter().all(|c| c.passed)
        && !report.aggregate_checks.is_empty();
    debug!(passed = report.passed, "validation complete");
    report
}

fn aggregate_check(name: &str, calculated: Money, expected: Money, tol: Money) -> AggregateCheck {
    let difference = calculated.abs_diff(expected);
    let passed = difference <= tol;
    if !passed {
        warn!(name, %calculated, %expected, %difference, "aggregate mismatch");
    }
    AggregateCheck {
        name: name.to_string(),
        calculated,
        expected,
        difference,
        passed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tillscan_core::TotalsAnchor;

    fn item(name: &str, cents: i64) -> ExtractedItem {
        ExtractedItem {
            product_name: name.to_string(),
            quantity: None,
            unit: None,
            unit_price: None,
            line_total: Money::from_cents(cents),
            on_sale: false,
            category: None,
        }
    }

    fn anchor(cents: i64, y: f64) -> TotalsAnchor {
        TotalsAnchor { row_id: 0, fragment_id: 0, amount: Money::from_cents(cents), center_y: y }
    }

    fn seq(subtotal: Option<i64>, total: Option<i64>) -> TotalsSequence {
        TotalsSequence {
            subtotal: subtotal.map(|c| anchor(c, 0.8)),
            total: total.map(|c| anchor(c, 0.9)),
            middle: vec![],
        }
    }

    #[test]
    fn balanced_receipt_passes() {
        let items = vec![item("A", 1000), item("B", 1049)];
        let report = validate(
            &items,
            &seq(Some(2049), Some(2049)),
            Money::zero(),
            &[],
            &[],
            &StoreConfig::default(),
        );
        assert!(report.passed);
        assert_eq!(report.aggregate_checks.len(), 2);
    }

    #[test]
    fn fees_and_tax_enter_the_ladder() {
        let items = vec![item("A", 2000)];
        let fees = vec![LabeledAmount { label: "Bottle Deposit".into(), amount: Money::from_cents(10) }];
        let report = validate(
            &items,
            &seq(Some(2000), Some(2101)),
            Money::from_cents(91),
            &fees,
            &[],
            &StoreConfig::default(),
        );
        assert!(report.passed);
    }

    #[test]
    fn subtotal_mismatch_fails_but_reports() {
        let items = vec![item("A", 1000)];
        let report = validate(
            &items,
            &seq(Some(2049), Some(2049)),
            Money::zero(),
            &[],
            &[],
            &StoreConfig::default(),
        );
        assert!(!report.passed);
        let check = &report.aggregate_checks[0];
        assert_eq!(check.difference, Money::from_cents(1049));
        assert!(!check.passed);
    }

    #[test]
    fn row_math_validates_quantity_times_unit_price() {
        let mut good = item("POTATO", 772);
        good.quantity = Some(Decimal::from_str("2.68").unwrap());
        good.unit_price = Some(Money::from_cents(288));
        let mut bad = item("ONION", 500);
        bad.quantity = Some(Decimal::from(2));
        bad.unit_price = Some(Money::from_cents(199));
        let report = validate(
            &[good, bad],
            &seq(Some(1272), Some(1272)),
            Money::zero(),
            &[],
            &[],
            &StoreConfig::default(),
        );
        assert_eq!(report.row_checks.len(), 2);
        assert!(report.row_checks[0].passed);
        assert!(!report.row_checks[1].passed);
        assert!(!report.passed);
    }

    #[test]
    fn on_sale_rows_are_skipped_not_failed() {
        let mut sale = item("YOGURT", 499);
        sale.quantity = Some(Decimal::from(2));
        sale.unit_price = Some(Money::from_cents(450));
        sale.on_sale = true;
        let report = validate(
            &[sale],
            &seq(Some(499), Some(499)),
            Money::zero(),
            &[],
            &[],
            &StoreConfig::default(),
        );
        assert!(report.row_checks[0].skipped);
        assert!(report.passed);
    }

    #[test]
    fn grocery_layout_checks_items_against_total() {
        let items = vec![item("BUN", 650)];
        let item_fees =
            vec![LabeledAmount { label: "Env Fee".into(), amount: Money::from_cents(1) }];
        let report = validate(
            &items,
            &seq(None, Some(651)),
            Money::zero(),
            &item_fees,
            &item_fees,
            &StoreConfig::default(),
        );
        assert!(report.passed);
        assert_eq!(report.aggregate_checks[0].name, "items_sum_vs_total");
    }

    #[test]
    fn tolerance_is_configurable() {
        let mut cfg = StoreConfig::default();
        cfg.checks.aggregate_tolerance_cents = 10;
        let items = vec![item("A", 1995)];
        let report = validate(
            &items,
            &seq(Some(2000), Some(2000)),
            Money::zero(),
            &[],
            &[],
            &cfg,
        );
        assert!(report.passed);
    }
}
