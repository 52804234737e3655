// Fact matching across contexts.
//
// Comparisons between facts only make sense when both describe the same
// economic reality: same period and same dimensional breakdown. A rule
// builds a constraint set from its source fact, swaps in the concept it
// wants to compare against, and queries the population.
use crate::model::{Document, Fact, FactId, Period, QName};
use std::collections::BTreeMap;

/// Partial aspect specification used as a query against the fact
/// population. Constructed transiently per comparison, never stored.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    pub concept: QName,
    pub period: Period,
    pub dimensions: BTreeMap<QName, QName>,
}

impl ConstraintSet {
    /// Copy every aspect of the source fact.
    pub fn from_fact(fact: &Fact) -> Self {
        Self {
            concept: fact.concept.clone(),
            period: fact.period.clone(),
            dimensions: fact.dimensions.clone(),
        }
    }

    /// Same aspects, different concept.
    pub fn with_concept(mut self, concept: QName) -> Self {
        self.concept = concept;
        self
    }

    fn matches(&self, fact: &Fact, allow_additional_dimensions: bool) -> bool {
        if fact.concept != self.concept || fact.period != self.period {
            return false;
        }
        if !allow_additional_dimensions && fact.dimensions.len() != self.dimensions.len() {
            return false;
        }
        self.dimensions
            .iter()
            .all(|(axis, member)| fact.dimension_value(axis) == Some(member))
    }
}

/// All facts satisfying the constraint set, in document order. Nil facts
/// are excluded unless `allow_nil` is set; rules that compare numbers have
/// nothing to compare on a nil fact.
pub fn matching_facts<'a>(
    doc: &'a Document,
    cs: &ConstraintSet,
    allow_nil: bool,
    allow_additional_dimensions: bool,
) -> Vec<(FactId, &'a Fact)> {
    doc.facts_for_concept(&cs.concept)
        .filter(|(_, fact)| allow_nil || !fact.is_nil())
        .filter(|(_, fact)| cs.matches(fact, allow_additional_dimensions))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Concept, Decimals, Dts, FactValue};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    const GAAP: &str = "http://fasb.org/us-gaap/2023-01-31";

    fn build_doc() -> Document {
        let mut dts = Dts::new();
        for name in ["Assets", "LiabilitiesAndStockholdersEquity"] {
            dts.add_concept(Concept::new(QName::new(GAAP, name)));
        }
        Document::new(dts)
    }

    fn fact(
        name: &str,
        value: i64,
        dims: &[(&str, &str)],
    ) -> Fact {
        let mut dimensions = BTreeMap::new();
        for (axis, member) in dims {
            dimensions.insert(QName::new(GAAP, *axis), QName::new(GAAP, *member));
        }
        Fact {
            concept: QName::new(GAAP, name),
            period: Period::instant(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            dimensions,
            unit: None,
            value: FactValue::Decimal(BigDecimal::from(value)),
            decimals: Decimals::D(0),
        }
    }

    #[test]
    fn exact_match_rejects_extra_dimensions() {
        let mut doc = build_doc();
        let source = fact("Assets", 100, &[("SegmentAxis", "RetailMember")]);
        doc.add_fact(source.clone());
        doc.add_fact(fact(
            "LiabilitiesAndStockholdersEquity",
            100,
            &[("SegmentAxis", "RetailMember"), ("RegionAxis", "EuropeMember")],
        ));

        let cs = ConstraintSet::from_fact(&source)
            .with_concept(QName::new(GAAP, "LiabilitiesAndStockholdersEquity"));
        assert!(matching_facts(&doc, &cs, false, false).is_empty());
        assert_eq!(matching_facts(&doc, &cs, false, true).len(), 1);
    }

    #[test]
    fn dimension_members_must_agree() {
        let mut doc = build_doc();
        let source = fact("Assets", 100, &[("SegmentAxis", "RetailMember")]);
        doc.add_fact(source.clone());
        doc.add_fact(fact(
            "LiabilitiesAndStockholdersEquity",
            100,
            &[("SegmentAxis", "WholesaleMember")],
        ));

        let cs = ConstraintSet::from_fact(&source)
            .with_concept(QName::new(GAAP, "LiabilitiesAndStockholdersEquity"));
        assert!(matching_facts(&doc, &cs, false, true).is_empty());
    }

    #[test]
    fn nil_facts_are_excluded_by_default() {
        let mut doc = build_doc();
        let source = fact("Assets", 100, &[]);
        doc.add_fact(source.clone());
        let mut nil = fact("LiabilitiesAndStockholdersEquity", 0, &[]);
        nil.value = FactValue::Nil;
        doc.add_fact(nil);

        let cs = ConstraintSet::from_fact(&source)
            .with_concept(QName::new(GAAP, "LiabilitiesAndStockholdersEquity"));
        assert!(matching_facts(&doc, &cs, false, false).is_empty());
        assert_eq!(matching_facts(&doc, &cs, true, false).len(), 1);
    }

    #[test]
    fn period_must_match() {
        let mut doc = build_doc();
        let source = fact("Assets", 100, &[]);
        doc.add_fact(source.clone());
        let mut other = fact("LiabilitiesAndStockholdersEquity", 100, &[]);
        other.period = Period::instant(NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());
        doc.add_fact(other);

        let cs = ConstraintSet::from_fact(&source)
            .with_concept(QName::new(GAAP, "LiabilitiesAndStockholdersEquity"));
        assert!(matching_facts(&doc, &cs, false, false).is_empty());
    }
}
