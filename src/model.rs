// Read-only document model handed to the rule engine.
//
// Facts, concepts, periods and units are materialized by an upstream
// parser; the engine only queries them. Periods are stored in XBRL 2.1
// end-of-day form: an "end" or "instant" calendar date is represented as
// midnight of the following day.
use ahash::AHashMap;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use compact_str::CompactString;
use std::collections::BTreeMap;
use std::fmt;

/// Standard label role from the XBRL 2.1 specification.
pub const ROLE_LABEL: &str = "http://www.xbrl.org/2003/role/label";

/// Index of a fact within its `Document`, used as a diagnostic location.
pub type FactId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: CompactString,
    pub local_name: CompactString,
}

impl QName {
    pub fn new(namespace: impl Into<CompactString>, local_name: impl Into<CompactString>) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for QName {
    /// Clark notation, used in tooltips.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}{}", self.namespace, self.local_name)
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub lang: CompactString,
    pub role: CompactString,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Concept {
    pub qname: QName,
    pub item_type: Option<QName>,
    pub numeric: bool,
    pub labels: Vec<Label>,
    /// Default domain member, present on dimension (axis) concepts.
    pub default_member: Option<QName>,
}

impl Concept {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            item_type: None,
            numeric: false,
            labels: Vec::new(),
            default_member: None,
        }
    }

    /// First English standard label, if any.
    pub fn standard_label(&self) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.lang.starts_with("en") && l.role == ROLE_LABEL)
            .map(|l| l.text.as_str())
    }
}

// Period with forever support
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Instant(NaiveDateTime),
    Duration {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    Forever,
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.succ_opt()
        .map_or(NaiveDateTime::MAX, |d| d.and_time(NaiveTime::MIN))
}

impl Period {
    /// Instant at the end of the given calendar day.
    pub fn instant(date: NaiveDate) -> Self {
        Period::Instant(end_of_day(date))
    }

    /// Duration spanning the given calendar days, both inclusive.
    pub fn duration(start: NaiveDate, end: NaiveDate) -> Self {
        Period::Duration {
            start: start.and_time(NaiveTime::MIN),
            end: end_of_day(end),
        }
    }

    pub fn is_duration(&self) -> bool {
        matches!(self, Period::Duration { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unit {
    pub numerator: Vec<QName>,
    pub denominator: Vec<QName>,
}

/// XBRL decimals attribute: the power-of-ten place to which a value is
/// accurate, or infinite precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decimals {
    Inf,
    D(i32),
}

impl Decimals {
    /// Least accurate of two precisions.
    pub fn min(self, other: Decimals) -> Decimals {
        match (self, other) {
            (Decimals::Inf, d) | (d, Decimals::Inf) => d,
            (Decimals::D(a), Decimals::D(b)) => Decimals::D(a.min(b)),
        }
    }
}

impl fmt::Display for Decimals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decimals::Inf => f.write_str("INF"),
            Decimals::D(d) => write!(f, "{}", d),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactValue {
    Decimal(BigDecimal),
    Date(NaiveDate),
    Text(String),
    Nil,
}

#[derive(Debug, Clone)]
pub struct Fact {
    pub concept: QName,
    pub period: Period,
    /// Explicit dimension members keyed by axis. Ordered so that rendered
    /// diagnostics are reproducible across runs.
    pub dimensions: BTreeMap<QName, QName>,
    pub unit: Option<Unit>,
    pub value: FactValue,
    pub decimals: Decimals,
}

impl Fact {
    pub fn is_nil(&self) -> bool {
        matches!(self.value, FactValue::Nil)
    }

    pub fn numeric_value(&self) -> Option<&BigDecimal> {
        match &self.value {
            FactValue::Decimal(v) => Some(v),
            _ => None,
        }
    }

    pub fn text_value(&self) -> Option<&str> {
        match &self.value {
            FactValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn date_value(&self) -> Option<NaiveDate> {
        match &self.value {
            FactValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Explicit member reported for the given axis, if any.
    pub fn dimension_value(&self, axis: &QName) -> Option<&QName> {
        self.dimensions.get(axis)
    }
}

#[derive(Debug, Clone)]
pub struct TypeDef {
    pub qname: QName,
    pub base: Option<QName>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub target_namespace: CompactString,
}

/// Discoverable taxonomy set: concepts, type definitions and the schemas
/// they were loaded from, plus preferred prefixes for display.
#[derive(Debug, Default)]
pub struct Dts {
    pub schemas: Vec<Schema>,
    concepts: AHashMap<QName, Concept>,
    types: AHashMap<QName, TypeDef>,
    prefixes: AHashMap<CompactString, CompactString>,
}

impl Dts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_schema(&mut self, target_namespace: impl Into<CompactString>) {
        self.schemas.push(Schema {
            target_namespace: target_namespace.into(),
        });
    }

    pub fn bind_prefix(
        &mut self,
        prefix: impl Into<CompactString>,
        namespace: impl Into<CompactString>,
    ) {
        self.prefixes.insert(namespace.into(), prefix.into());
    }

    pub fn add_concept(&mut self, concept: Concept) {
        self.concepts.insert(concept.qname.clone(), concept);
    }

    pub fn add_type(&mut self, type_def: TypeDef) {
        self.types.insert(type_def.qname.clone(), type_def);
    }

    pub fn resolve_concept(&self, qname: &QName) -> Option<&Concept> {
        self.concepts.get(qname)
    }

    pub fn type_definition(&self, qname: &QName) -> Option<&TypeDef> {
        self.types.get(qname)
    }

    /// Whether `ty` is or derives from `base` in the type hierarchy.
    pub fn is_derived_from(&self, ty: &QName, base: &QName) -> bool {
        let mut current = Some(ty);
        // Hop cap guards against cyclic restriction chains in bad schemas.
        for _ in 0..64 {
            match current {
                Some(t) if t == base => return true,
                Some(t) => current = self.types.get(t).and_then(|d| d.base.as_ref()),
                None => return false,
            }
        }
        false
    }

    pub fn prefix_for(&self, namespace: &str) -> Option<&str> {
        self.prefixes.get(namespace).map(|p| p.as_str())
    }

    /// `prefix:LocalName` if a prefix is bound, else the bare local name.
    pub fn prefixed_name(&self, qname: &QName) -> String {
        match self.prefix_for(&qname.namespace) {
            Some(prefix) => format!("{}:{}", prefix, qname.local_name),
            None => qname.local_name.to_string(),
        }
    }
}

/// A fully materialized filing: taxonomy set plus the fact population,
/// indexed by concept for rule scans. Immutable for the whole run.
#[derive(Debug, Default)]
pub struct Document {
    pub dts: Dts,
    facts: Vec<Fact>,
    by_concept: AHashMap<QName, Vec<FactId>>,
}

impl Document {
    pub fn new(dts: Dts) -> Self {
        Self {
            dts,
            facts: Vec::new(),
            by_concept: AHashMap::new(),
        }
    }

    pub fn add_fact(&mut self, fact: Fact) -> FactId {
        let id = self.facts.len();
        self.by_concept
            .entry(fact.concept.clone())
            .or_default()
            .push(id);
        self.facts.push(fact);
        id
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn fact(&self, id: FactId) -> &Fact {
        &self.facts[id]
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Facts reported against the given concept, in document order.
    pub fn facts_for_concept<'a>(
        &'a self,
        qname: &QName,
    ) -> impl Iterator<Item = (FactId, &'a Fact)> + 'a {
        self.by_concept
            .get(qname)
            .into_iter()
            .flatten()
            .map(|&id| (id, &self.facts[id]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn period_constructors_use_end_of_day() {
        let p = Period::instant(date(2021, 12, 31));
        assert_eq!(
            p,
            Period::Instant(date(2022, 1, 1).and_time(NaiveTime::MIN))
        );

        let d = Period::duration(date(2021, 1, 1), date(2021, 12, 31));
        assert_eq!(
            d,
            Period::Duration {
                start: date(2021, 1, 1).and_time(NaiveTime::MIN),
                end: date(2022, 1, 1).and_time(NaiveTime::MIN),
            }
        );
    }

    #[test]
    fn decimals_min_prefers_finite() {
        assert_eq!(Decimals::Inf.min(Decimals::D(-6)), Decimals::D(-6));
        assert_eq!(Decimals::D(-5).min(Decimals::D(-6)), Decimals::D(-6));
        assert_eq!(Decimals::Inf.min(Decimals::Inf), Decimals::Inf);
    }

    #[test]
    fn type_derivation_walks_base_chain() {
        let mut dts = Dts::new();
        let string_ty = QName::new("http://www.xbrl.org/2003/instance", "stringItemType");
        let block_ty = QName::new("http://www.xbrl.org/dtr/type/non-numeric", "textBlockItemType");
        let custom_ty = QName::new("http://example.com/2021", "policyTextBlockItemType");
        dts.add_type(TypeDef {
            qname: block_ty.clone(),
            base: Some(string_ty.clone()),
        });
        dts.add_type(TypeDef {
            qname: custom_ty.clone(),
            base: Some(block_ty.clone()),
        });

        assert!(dts.is_derived_from(&custom_ty, &block_ty));
        assert!(dts.is_derived_from(&block_ty, &block_ty));
        assert!(dts.is_derived_from(&custom_ty, &string_ty));
        assert!(!dts.is_derived_from(&string_ty, &block_ty));
    }

    #[test]
    fn prefixed_name_falls_back_to_local() {
        let mut dts = Dts::new();
        dts.bind_prefix("dei", "http://xbrl.sec.gov/dei/2023-01-31");
        let known = QName::new("http://xbrl.sec.gov/dei/2023-01-31", "DocumentType");
        let unknown = QName::new("http://example.com/x", "Custom");
        assert_eq!(dts.prefixed_name(&known), "dei:DocumentType");
        assert_eq!(dts.prefixed_name(&unknown), "Custom");
    }
}
