// Member-exclusion predicates for the negative-values rule.
//
// Certain domain members legitimately carry negative values (contra
// accounts, adjustments, eliminations). The exclusion table is a list of
// small boolean expression trees over a single dimension aspect; a fact is
// exempt when any tree matches any of its aspects.
use crate::model::{Fact, QName};
use serde::Deserialize;

/// Which part of the aspect a leaf test inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AspectPart {
    Member,
    Dimension,
}

/// Expression tree as serialized in the exclusion table. The `test` tag
/// values mirror the published DQC exclusion rule wording.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "test")]
pub enum ExclusionRule {
    #[serde(rename = "Contains the text")]
    Contains { dim: AspectPart, text: String },
    #[serde(rename = "Equals")]
    Equals { dim: AspectPart, name: String },
    #[serde(rename = "AND")]
    And {
        arg1: Box<ExclusionRule>,
        arg2: Box<ExclusionRule>,
    },
    #[serde(rename = "OR")]
    Or {
        arg1: Box<ExclusionRule>,
        arg2: Box<ExclusionRule>,
    },
}

fn tested_name<'a>(part: AspectPart, axis: &'a QName, member: &'a QName) -> &'a str {
    match part {
        AspectPart::Member => &member.local_name,
        AspectPart::Dimension => &axis.local_name,
    }
}

impl ExclusionRule {
    /// Evaluate the tree against one (axis, member) aspect pair.
    pub fn evaluate(&self, axis: &QName, member: &QName) -> bool {
        match self {
            ExclusionRule::Contains { dim, text } => {
                let name = tested_name(*dim, axis, member).to_ascii_lowercase();
                name.contains(&text.to_ascii_lowercase())
            }
            ExclusionRule::Equals { dim, name } => tested_name(*dim, axis, member) == name,
            ExclusionRule::And { arg1, arg2 } => {
                arg1.evaluate(axis, member) && arg2.evaluate(axis, member)
            }
            ExclusionRule::Or { arg1, arg2 } => {
                arg1.evaluate(axis, member) || arg2.evaluate(axis, member)
            }
        }
    }
}

/// Whether any exclusion rule matches any dimension aspect of the fact.
pub fn is_excluded(fact: &Fact, rules: &[ExclusionRule]) -> bool {
    fact.dimensions
        .iter()
        .any(|(axis, member)| rules.iter().any(|rule| rule.evaluate(axis, member)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aspect(axis: &str, member: &str) -> (QName, QName) {
        (
            QName::new("http://fasb.org/us-gaap/2023-01-31", axis),
            QName::new("http://fasb.org/us-gaap/2023-01-31", member),
        )
    }

    #[test]
    fn contains_is_case_insensitive_on_member_name() {
        let rule: ExclusionRule = serde_json::from_str(
            r#"{"test": "Contains the text", "dim": "Member", "text": "adjustment"}"#,
        )
        .unwrap();
        let (axis, member) = aspect("StatementEquityComponentsAxis", "AccumulatedAdjustmentMember");
        assert!(rule.evaluate(&axis, &member));

        let (axis, member) = aspect("StatementEquityComponentsAxis", "CommonStockMember");
        assert!(!rule.evaluate(&axis, &member));
    }

    #[test]
    fn equals_tests_the_dimension_name_when_asked() {
        let rule: ExclusionRule = serde_json::from_str(
            r#"{"test": "Equals", "dim": "Dimension", "name": "StatementBusinessSegmentsAxis"}"#,
        )
        .unwrap();
        let (axis, member) = aspect("StatementBusinessSegmentsAxis", "AnyMember");
        assert!(rule.evaluate(&axis, &member));

        let (axis, member) = aspect("OtherAxis", "StatementBusinessSegmentsAxis");
        assert!(!rule.evaluate(&axis, &member));
    }

    #[test]
    fn and_or_compose() {
        let rule: ExclusionRule = serde_json::from_str(
            r#"{
                "test": "AND",
                "arg1": {"test": "Contains the text", "dim": "Member", "text": "Parent"},
                "arg2": {
                    "test": "OR",
                    "arg1": {"test": "Equals", "dim": "Dimension", "name": "ConsolidationItemsAxis"},
                    "arg2": {"test": "Contains the text", "dim": "Dimension", "text": "LegalEntity"}
                }
            }"#,
        )
        .unwrap();
        let (axis, member) = aspect("ConsolidationItemsAxis", "ParentCompanyMember");
        assert!(rule.evaluate(&axis, &member));

        let (axis, member) = aspect("SegmentAxis", "ParentCompanyMember");
        assert!(!rule.evaluate(&axis, &member));

        let (axis, member) = aspect("ConsolidationItemsAxis", "SubsidiaryMember");
        assert!(!rule.evaluate(&axis, &member));
    }
}
