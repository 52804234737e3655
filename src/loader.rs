// Document-model JSON ingest.
//
// The engine does not parse XBRL; an upstream processor serializes its
// resolved fact population to a small JSON form, which this module
// materializes into a `Document`. Prefixed names resolve against the
// file's own prefix table; calendar dates are normalized to XBRL
// end-of-day form on load.
use crate::model::{
    Concept, Decimals, Document, Dts, Fact, FactValue, Label, Period, QName, TypeDef, Unit,
    ROLE_LABEL,
};
use crate::{Error, Result};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct RawDocument {
    /// Prefix to namespace URI. Every namespace listed here is also
    /// registered as a loaded schema for namespace-family resolution.
    namespaces: BTreeMap<String, String>,
    #[serde(default)]
    types: Vec<RawType>,
    #[serde(default)]
    concepts: Vec<RawConcept>,
    #[serde(default)]
    facts: Vec<RawFact>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
    #[serde(default)]
    base: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConcept {
    name: String,
    #[serde(rename = "type", default)]
    item_type: Option<String>,
    #[serde(default)]
    numeric: bool,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "defaultMember", default)]
    default_member: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFact {
    concept: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    decimals: Option<serde_json::Value>,
    #[serde(default)]
    nil: bool,
    period: RawPeriod,
    #[serde(default)]
    unit: Option<RawUnit>,
    #[serde(default)]
    dimensions: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPeriod {
    Instant { instant: String },
    Duration { start: String, end: String },
    Keyword(String),
}

#[derive(Debug, Deserialize)]
struct RawUnit {
    #[serde(default)]
    numerator: Vec<String>,
    #[serde(default)]
    denominator: Vec<String>,
}

pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;
    load_str(&content)
}

pub fn load_str(json: &str) -> Result<Document> {
    let raw: RawDocument =
        serde_json::from_str(json).map_err(|e| Error::Parse(format!("invalid document: {}", e)))?;
    build(raw)
}

fn build(raw: RawDocument) -> Result<Document> {
    let mut dts = Dts::new();
    for (prefix, namespace) in &raw.namespaces {
        dts.add_schema(namespace.as_str());
        dts.bind_prefix(prefix.as_str(), namespace.as_str());
    }

    let resolve = |name: &str| -> Result<QName> {
        let (prefix, local) = name
            .split_once(':')
            .ok_or_else(|| Error::Parse(format!("name {:?} has no prefix", name)))?;
        let namespace = raw
            .namespaces
            .get(prefix)
            .ok_or_else(|| Error::Parse(format!("undeclared prefix {:?} in {:?}", prefix, name)))?;
        Ok(QName::new(namespace.as_str(), local))
    };

    for ty in &raw.types {
        dts.add_type(TypeDef {
            qname: resolve(&ty.name)?,
            base: ty.base.as_deref().map(&resolve).transpose()?,
        });
    }

    for concept in &raw.concepts {
        let mut c = Concept::new(resolve(&concept.name)?);
        c.item_type = concept.item_type.as_deref().map(&resolve).transpose()?;
        c.numeric = concept.numeric;
        c.default_member = concept.default_member.as_deref().map(&resolve).transpose()?;
        if let Some(text) = &concept.label {
            c.labels.push(Label {
                lang: "en".into(),
                role: ROLE_LABEL.into(),
                text: text.clone(),
            });
        }
        dts.add_concept(c);
    }

    let mut doc = Document::new(dts);
    for fact in &raw.facts {
        let concept = resolve(&fact.concept)?;
        let numeric = doc
            .dts
            .resolve_concept(&concept)
            .map(|c| c.numeric)
            .unwrap_or(false);
        let mut dimensions = BTreeMap::new();
        for (axis, member) in &fact.dimensions {
            dimensions.insert(resolve(axis)?, resolve(member)?);
        }
        doc.add_fact(Fact {
            period: parse_period(&fact.period)?,
            dimensions,
            unit: fact
                .unit
                .as_ref()
                .map(|u| {
                    Ok::<Unit, Error>(Unit {
                        numerator: u.numerator.iter().map(|m| resolve(m)).collect::<Result<_>>()?,
                        denominator: u
                            .denominator
                            .iter()
                            .map(|m| resolve(m))
                            .collect::<Result<_>>()?,
                    })
                })
                .transpose()?,
            value: parse_value(fact, numeric)?,
            decimals: parse_decimals(fact.decimals.as_ref())?,
            concept,
        });
    }
    Ok(doc)
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| Error::Parse(format!("invalid date {:?}: {}", text, e)))
}

fn parse_period(raw: &RawPeriod) -> Result<Period> {
    match raw {
        RawPeriod::Instant { instant } => Ok(Period::instant(parse_date(instant)?)),
        RawPeriod::Duration { start, end } => {
            let start = parse_date(start)?;
            let end = parse_date(end)?;
            if start > end {
                return Err(Error::Parse(format!(
                    "period start {} after end {}",
                    start, end
                )));
            }
            Ok(Period::duration(start, end))
        }
        RawPeriod::Keyword(word) if word == "forever" => Ok(Period::Forever),
        RawPeriod::Keyword(word) => Err(Error::Parse(format!("unknown period {:?}", word))),
    }
}

/// Numeric concepts parse their value as an exact decimal. Non-numeric
/// string values that look like ISO dates become schema dates, which is
/// what the document period end date rules compare against.
fn parse_value(fact: &RawFact, numeric: bool) -> Result<FactValue> {
    if fact.nil {
        return Ok(FactValue::Nil);
    }
    let value = fact
        .value
        .as_ref()
        .ok_or_else(|| Error::Parse(format!("fact {} has no value", fact.concept)))?;
    match value {
        serde_json::Value::Number(n) => parse_decimal(&n.to_string()),
        serde_json::Value::String(s) if numeric => parse_decimal(s),
        serde_json::Value::String(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => Ok(FactValue::Date(date)),
            Err(_) => Ok(FactValue::Text(s.clone())),
        },
        other => Err(Error::Parse(format!(
            "unsupported value {} for fact {}",
            other, fact.concept
        ))),
    }
}

fn parse_decimal(text: &str) -> Result<FactValue> {
    BigDecimal::from_str(text)
        .map(FactValue::Decimal)
        .map_err(|e| Error::Parse(format!("invalid numeric value {:?}: {}", text, e)))
}

fn parse_decimals(raw: Option<&serde_json::Value>) -> Result<Decimals> {
    match raw {
        None => Ok(Decimals::Inf),
        Some(serde_json::Value::String(s)) if s == "INF" => Ok(Decimals::Inf),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Decimals::D)
            .ok_or_else(|| Error::Parse(format!("invalid decimals {}", n))),
        Some(other) => Err(Error::Parse(format!("invalid decimals {}", other))),
    }
}
