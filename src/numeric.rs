// Decimals-aware numeric comparison.
//
// Filings report the same number at different precisions (millions vs.
// exact dollars), so rule comparisons happen at the least accurate of the
// two declared precisions, rounded half-to-even per XBRL 2.1.
use crate::model::{Decimals, Fact};
use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode};

/// Comparison policy invoked with both raw values and the shared precision
/// (`None` when both facts are infinitely precise).
pub type ComparisonPolicy = fn(&BigDecimal, &BigDecimal, Option<i32>) -> bool;

/// Round to the given XBRL decimals place using round-half-to-even.
pub fn round_half_even(value: &BigDecimal, decimals: i32) -> BigDecimal {
    value.with_scale_round(i64::from(decimals), RoundingMode::HalfEven)
}

/// `2 × 10^-decimals`: two units at the reported scale.
fn tolerance(decimals: i32) -> BigDecimal {
    BigDecimal::new(BigInt::from(2), i64::from(decimals))
}

/// Compare two numeric facts at the least accurate of their declared
/// precisions. Returns `None` when either fact has no numeric value, which
/// callers treat as "rule not applicable to this pair".
pub fn decimal_comparison(fact1: &Fact, fact2: &Fact, cmp: ComparisonPolicy) -> Option<bool> {
    let v1 = fact1.numeric_value()?;
    let v2 = fact2.numeric_value()?;
    match fact1.decimals.min(fact2.decimals) {
        Decimals::Inf => Some(cmp(v1, v2, None)),
        Decimals::D(d) => Some(cmp(v1, v2, Some(d))),
    }
}

/// Equal after rounding to the shared precision, or within two units at the
/// reported scale. A value reported in millions may differ from its
/// counterpart by up to 2,000,000 and still be considered equal.
pub fn equal_within_tolerance(v1: &BigDecimal, v2: &BigDecimal, decimals: Option<i32>) -> bool {
    match decimals {
        None => v1 == v2,
        Some(d) => {
            round_half_even(v1, d) == round_half_even(v2, d) || (v1 - v2).abs() <= tolerance(d)
        }
    }
}

/// Less-or-equal on the rounded values; the tolerance does not apply.
pub fn less_or_equal(v1: &BigDecimal, v2: &BigDecimal, decimals: Option<i32>) -> bool {
    match decimals {
        None => v1 <= v2,
        Some(d) => round_half_even(v1, d) <= round_half_even(v2, d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FactValue, Period, QName};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn numeric_fact(value: &str, decimals: Decimals) -> Fact {
        Fact {
            concept: QName::new("http://fasb.org/us-gaap/2023", "Assets"),
            period: Period::instant(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            dimensions: BTreeMap::new(),
            unit: None,
            value: FactValue::Decimal(dec(value)),
            decimals,
        }
    }

    #[test]
    fn half_even_rounds_to_nearest_even_million() {
        assert_eq!(
            round_half_even(&dec("532500000"), -6),
            dec("532000000")
        );
        assert_eq!(
            round_half_even(&dec("532500001"), -6),
            dec("533000000")
        );
    }

    #[test]
    fn mixed_precision_rounds_to_least_accurate() {
        // 532,000,000 at -6 vs 532,300,000 at -5: both round to 532 million.
        let a = numeric_fact("532000000", Decimals::D(-6));
        let b = numeric_fact("532300000", Decimals::D(-5));
        assert_eq!(
            decimal_comparison(&a, &b, equal_within_tolerance),
            Some(true)
        );
    }

    #[test]
    fn difference_beyond_tolerance_is_unequal() {
        let a = numeric_fact("532000000", Decimals::D(-6));
        let b = numeric_fact("534000001", Decimals::D(-6));
        assert_eq!(
            decimal_comparison(&a, &b, equal_within_tolerance),
            Some(false)
        );
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let d = Some(0);
        assert!(equal_within_tolerance(&dec("100"), &dec("102"), d));
        assert!(!equal_within_tolerance(&dec("100"), &dec("102.0001"), d));

        let m = Some(-6);
        assert!(equal_within_tolerance(
            &dec("532000000"),
            &dec("534000000"),
            m
        ));
        assert!(!equal_within_tolerance(
            &dec("532000000"),
            &dec("534000001"),
            m
        ));
    }

    #[test]
    fn infinite_precision_compares_exactly() {
        let a = numeric_fact("100.00", Decimals::Inf);
        let b = numeric_fact("100", Decimals::Inf);
        let c = numeric_fact("100.01", Decimals::Inf);
        assert_eq!(
            decimal_comparison(&a, &b, equal_within_tolerance),
            Some(true)
        );
        assert_eq!(
            decimal_comparison(&a, &c, equal_within_tolerance),
            Some(false)
        );
    }

    #[test]
    fn less_or_equal_uses_rounded_values() {
        let a = numeric_fact("532400000", Decimals::D(-6));
        let b = numeric_fact("532000000", Decimals::D(-6));
        // 532.4M rounds to 532M, so a <= b holds after rounding.
        assert_eq!(decimal_comparison(&a, &b, less_or_equal), Some(true));

        let c = numeric_fact("533000000", Decimals::D(-6));
        assert_eq!(decimal_comparison(&c, &b, less_or_equal), Some(false));
        assert_eq!(decimal_comparison(&b, &c, less_or_equal), Some(true));
    }

    #[test]
    fn non_numeric_operand_is_not_comparable() {
        let a = numeric_fact("100", Decimals::D(0));
        let mut b = numeric_fact("0", Decimals::D(0));
        b.value = FactValue::Text("n/a".into());
        assert_eq!(decimal_comparison(&a, &b, equal_within_tolerance), None);
    }
}
