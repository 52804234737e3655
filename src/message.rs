// Message templating and diagnostic construction.
//
// Every reported violation is built from a rule's message template.
// Placeholders are `${param.property[.subproperty]}` and resolve against
// typed named arguments; an unresolvable placeholder aborts the run, since
// a malformed message is worse than a missing one.
use crate::dates::{format_date, period_duration_days};
use crate::diag::{Diagnostic, Param, Severity};
use crate::model::{Concept, Document, Fact, FactId, Period, QName};
use crate::tables::{RuleTables, RuleVersion};
use crate::{Error, Result};
use ahash::AHashSet;
use bigdecimal::BigDecimal;
use compact_str::CompactString;
use once_cell::sync::Lazy;
use regex::Regex;

/// The standard properties block appended under every violation.
const PROPERTY_LINES: [&str; 5] = [
    "The properties of this ${fact1.name} fact are:",
    "Period: ${fact1.period}",
    "Dimensions: ${fact1.dimensions}",
    "Unit: ${fact1.unit}",
    "Rule version: ${ruleVersion}",
];

static RULE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^DQC\.US\.[0-9]{4}(\.[0-9]+)?$").expect("rule code pattern"));

/// Rule codes excluded from reporting for this run. Built once from
/// configuration, consulted before any message construction.
#[derive(Debug, Default)]
pub struct SuppressionSet {
    codes: AHashSet<String>,
}

impl SuppressionSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a `|`-delimited list of rule codes. A code may name a single
    /// test (`DQC.US.0015.2`) or a whole family (`DQC.US.0015`). Anything
    /// else is a fatal configuration error.
    pub fn parse(list: &str) -> Result<Self> {
        let mut codes = AHashSet::new();
        for code in list.split('|') {
            let code = code.trim();
            if code.is_empty() {
                continue;
            }
            if !RULE_CODE.is_match(code) {
                return Err(Error::Config(format!(
                    "malformed rule code in suppression list: {:?}",
                    code
                )));
            }
            codes.insert(code.to_string());
        }
        Ok(Self { codes })
    }

    /// Exact match, or family match with the trailing test number stripped.
    pub fn contains(&self, rule_id: &str) -> bool {
        if self.codes.contains(rule_id) {
            return true;
        }
        match rule_id.rsplit_once('.') {
            Some((family, tail)) => {
                !tail.is_empty()
                    && tail.bytes().all(|b| b.is_ascii_digit())
                    && self.codes.contains(family)
            }
            None => false,
        }
    }
}

/// A typed template argument.
#[derive(Clone, Copy)]
pub enum MessageArg<'a> {
    Fact { id: FactId, fact: &'a Fact },
    Concept(&'a Concept),
    Rule(&'a RuleVersion),
    Scalar(&'a str),
}

/// Named arguments for one diagnostic, in insertion order. Every rule
/// passes its primary fact as `fact1`.
#[derive(Clone, Default)]
pub struct MessageArgs<'a> {
    items: Vec<(CompactString, MessageArg<'a>)>,
}

impl<'a> MessageArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fact(mut self, name: &str, id: FactId, fact: &'a Fact) -> Self {
        self.items.push((name.into(), MessageArg::Fact { id, fact }));
        self
    }

    pub fn concept(mut self, name: &str, concept: &'a Concept) -> Self {
        self.items.push((name.into(), MessageArg::Concept(concept)));
        self
    }

    pub fn scalar(mut self, name: &str, value: &'a str) -> Self {
        self.items.push((name.into(), MessageArg::Scalar(value)));
        self
    }

    fn rule_version(mut self, version: &'a RuleVersion) -> Self {
        self.items
            .push(("ruleVersion".into(), MessageArg::Rule(version)));
        self
    }

    fn get(&self, name: &str) -> Option<MessageArg<'a>> {
        self.items
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, arg)| *arg)
    }
}

/// Builds diagnostics from rule templates and delivers them to the caller,
/// applying suppression before any rendering work.
pub struct Reporter<'a> {
    doc: &'a Document,
    tables: &'a RuleTables,
    suppress: &'a SuppressionSet,
}

impl<'a> Reporter<'a> {
    pub fn new(doc: &'a Document, tables: &'a RuleTables, suppress: &'a SuppressionSet) -> Self {
        Self {
            doc,
            tables,
            suppress,
        }
    }

    /// Construct the diagnostic for one violation, or `None` when the rule
    /// is suppressed. A missing template or an unresolvable placeholder is
    /// fatal.
    pub fn report(&self, rule_id: &str, args: MessageArgs<'a>) -> Result<Option<Diagnostic>> {
        if self.suppress.contains(rule_id) {
            tracing::debug!(rule_id, "violation suppressed");
            return Ok(None);
        }
        let template = self.tables.template(rule_id).ok_or_else(|| {
            Error::Config(format!("no message template for rule {}", rule_id))
        })?;
        let args = args.rule_version(&template.version);

        let location = match args.get("fact1") {
            Some(MessageArg::Fact { id, .. }) => id,
            _ => {
                return Err(Error::Template(format!(
                    "rule {} reported without a fact1 argument",
                    rule_id
                )))
            }
        };

        let mut property_lines = Vec::with_capacity(PROPERTY_LINES.len() - 1);
        for line in &PROPERTY_LINES[1..] {
            property_lines.push(self.render(line, &args, Severity::Other, None, Vec::new())?);
        }

        let mut children = Vec::new();
        if let Some(hint) = &template.hint {
            children.push(self.render(hint, &args, Severity::Info, None, Vec::new())?);
        }
        children.push(self.render(
            PROPERTY_LINES[0],
            &args,
            Severity::Other,
            None,
            property_lines,
        )?);

        let (message, params) = self.render_text(&template.msg, &args)?;
        Ok(Some(Diagnostic {
            rule: Some(rule_id.to_string()),
            severity: Severity::Error,
            message: format!("[{}] {}", rule_id, message),
            location: Some(location),
            params,
            children,
        }))
    }

    fn render(
        &self,
        template: &str,
        args: &MessageArgs<'a>,
        severity: Severity,
        location: Option<FactId>,
        children: Vec<Diagnostic>,
    ) -> Result<Diagnostic> {
        let (message, params) = self.render_text(template, args)?;
        Ok(Diagnostic {
            rule: None,
            severity,
            message,
            location,
            params,
            children,
        })
    }

    fn render_text(&self, template: &str, args: &MessageArgs<'a>) -> Result<(String, Vec<Param>)> {
        let mut out = String::new();
        let mut params = Vec::new();
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                Error::Template(format!("unterminated placeholder in template: {}", template))
            })?;
            self.resolve(&after[..end], args, &mut out, &mut params)?;
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok((out, params))
    }

    fn resolve(
        &self,
        path: &str,
        args: &MessageArgs<'a>,
        out: &mut String,
        params: &mut Vec<Param>,
    ) -> Result<()> {
        let mut parts = path.split('.');
        let name = parts.next().unwrap_or_default();
        let mut props: Vec<&str> = parts.collect();
        // `${fact1.fact.value}` is accepted as a synonym of `${fact1.value}`.
        if props.first() == Some(&"fact") {
            props.remove(0);
        }

        let arg = args
            .get(name)
            .ok_or_else(|| Error::Template(format!("missing value for parameter {}", name)))?;

        let rendered = match arg {
            MessageArg::Fact { id, fact } => self.resolve_fact(id, fact, &props)?,
            MessageArg::Concept(concept) => self.resolve_concept(concept, &props)?,
            MessageArg::Rule(version) => match props.as_slice() {
                [] => Rendered {
                    text: version.version.clone(),
                    tooltip: Some(version.release_date.clone()),
                    location: None,
                },
                _ => {
                    return Err(Error::Template(format!(
                        "unknown rule version property {}",
                        props.join(".")
                    )))
                }
            },
            MessageArg::Scalar(text) => match props.as_slice() {
                [] => Rendered::plain(text.to_string()),
                _ => {
                    return Err(Error::Template(format!(
                        "unknown property {} on scalar parameter {}",
                        props.join("."),
                        name
                    )))
                }
            },
        };

        out.push_str(&rendered.text);
        params.push(Param {
            name: path.to_string(),
            text: rendered.text,
            tooltip: rendered.tooltip,
            location: rendered.location,
        });
        Ok(())
    }

    fn resolve_fact(&self, id: FactId, fact: &Fact, props: &[&str]) -> Result<Rendered> {
        let located = |text: String, tooltip: Option<String>| Rendered {
            text,
            tooltip,
            location: Some(id),
        };
        match props {
            ["name"] => Ok(located(
                self.doc.dts.prefixed_name(&fact.concept),
                Some(fact.concept.to_string()),
            )),
            ["localName"] => Ok(located(
                fact.concept.local_name.to_string(),
                Some(fact.concept.to_string()),
            )),
            ["label"] => Ok(located(
                self.label(&fact.concept),
                Some(fact.concept.to_string()),
            )),
            ["value"] => Ok(located(self.format_value(fact), None)),
            ["decimals"] => Ok(located(fact.decimals.to_string(), None)),
            ["dimensions"] => Ok(located(self.format_dimensions(fact), None)),
            ["unit"] => Ok(located(self.format_unit(fact), None)),
            ["period", rest @ ..] => self.resolve_period(id, fact, rest),
            _ => Err(Error::Template(format!(
                "unknown fact property {}",
                props.join(".")
            ))),
        }
    }

    fn resolve_period(&self, id: FactId, fact: &Fact, props: &[&str]) -> Result<Rendered> {
        let located = |text: String| Rendered {
            text,
            tooltip: None,
            location: Some(id),
        };
        match (props, &fact.period) {
            ([], Period::Instant(at)) => Ok(located(format_date(*at, true))),
            ([], Period::Duration { start, end }) => Ok(located(format!(
                "{} - {}",
                format_date(*start, false),
                format_date(*end, true)
            ))),
            ([], Period::Forever) => Ok(located("forever".to_string())),
            (["startDate"], Period::Duration { start, .. }) => {
                Ok(located(format_date(*start, false)))
            }
            (["endDate"], Period::Duration { end, .. }) => Ok(located(format_date(*end, true))),
            (["endDate"], Period::Instant(at)) | (["instant"], Period::Instant(at)) => {
                Ok(located(format_date(*at, true)))
            }
            (["durationDays"], _) => Ok(located(period_duration_days(fact).to_string())),
            ([prop @ ("startDate" | "endDate" | "instant")], _) => Err(Error::Template(format!(
                "period of this fact has no {}",
                prop
            ))),
            (unknown, _) => Err(Error::Template(format!(
                "unknown period property {}",
                unknown.join(".")
            ))),
        }
    }

    fn resolve_concept(&self, concept: &Concept, props: &[&str]) -> Result<Rendered> {
        let with_tooltip = |text: String| Rendered {
            text,
            tooltip: Some(concept.qname.to_string()),
            location: None,
        };
        match props {
            ["name"] => Ok(with_tooltip(self.doc.dts.prefixed_name(&concept.qname))),
            ["localName"] => Ok(with_tooltip(concept.qname.local_name.to_string())),
            ["label"] => Ok(with_tooltip(self.label(&concept.qname))),
            _ => Err(Error::Template(format!(
                "unknown concept property {}",
                props.join(".")
            ))),
        }
    }

    /// English standard label of the concept, falling back to its prefixed
    /// name when the taxonomy carries none.
    fn label(&self, qname: &QName) -> String {
        self.doc
            .dts
            .resolve_concept(qname)
            .and_then(|c| c.standard_label().map(str::to_string))
            .unwrap_or_else(|| self.doc.dts.prefixed_name(qname))
    }

    fn format_value(&self, fact: &Fact) -> String {
        match &fact.value {
            crate::model::FactValue::Nil => "nil".to_string(),
            crate::model::FactValue::Decimal(v) => format_numeric(v),
            crate::model::FactValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            crate::model::FactValue::Text(s) => s.clone(),
        }
    }

    fn format_dimensions(&self, fact: &Fact) -> String {
        if fact.dimensions.is_empty() {
            return "none".to_string();
        }
        fact.dimensions
            .iter()
            .map(|(axis, member)| {
                format!(
                    "{} = {}",
                    self.doc.dts.prefixed_name(axis),
                    self.doc.dts.prefixed_name(member)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn format_unit(&self, fact: &Fact) -> String {
        let Some(unit) = &fact.unit else {
            return "none".to_string();
        };
        let join = |measures: &[QName]| {
            measures
                .iter()
                .map(|m| m.local_name.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        };
        if unit.denominator.is_empty() {
            join(&unit.numerator)
        } else {
            format!("{} / {}", join(&unit.numerator), join(&unit.denominator))
        }
    }
}

struct Rendered {
    text: String,
    tooltip: Option<String>,
    location: Option<FactId>,
}

impl Rendered {
    fn plain(text: String) -> Self {
        Self {
            text,
            tooltip: None,
            location: None,
        }
    }
}

/// Thousands-separated rendering of a decimal value.
fn format_numeric(value: &BigDecimal) -> String {
    let plain = value.to_string();
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Decimals, Dts, FactValue, Unit};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    const GAAP: &str = "http://fasb.org/us-gaap/2023-01-31";

    fn doc_with_assets_fact() -> Document {
        let mut dts = Dts::new();
        dts.bind_prefix("us-gaap", GAAP);
        let mut concept = Concept::new(QName::new(GAAP, "Assets"));
        concept.numeric = true;
        concept.labels.push(crate::model::Label {
            lang: "en".into(),
            role: crate::model::ROLE_LABEL.into(),
            text: "Assets".into(),
        });
        dts.add_concept(concept);
        let mut doc = Document::new(dts);
        doc.add_fact(Fact {
            concept: QName::new(GAAP, "Assets"),
            period: Period::instant(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            dimensions: BTreeMap::new(),
            unit: Some(Unit {
                numerator: vec![QName::new("http://www.xbrl.org/2003/iso4217", "USD")],
                denominator: Vec::new(),
            }),
            value: FactValue::Decimal(BigDecimal::from_str("1234567.5").unwrap()),
            decimals: Decimals::D(-3),
        });
        doc
    }

    #[test]
    fn renders_fact_placeholders() {
        let doc = doc_with_assets_fact();
        let suppress = SuppressionSet::empty();
        let reporter = Reporter::new(&doc, RuleTables::bundled(), &suppress);
        let args = MessageArgs::new().fact("fact1", 0, doc.fact(0));
        let (text, params) = reporter
            .render_text(
                "${fact1.name} = ${fact1.value} (decimals ${fact1.decimals}) in ${fact1.unit} at ${fact1.period}",
                &args,
            )
            .unwrap();
        assert_eq!(
            text,
            "us-gaap:Assets = 1,234,567.5 (decimals -3) in USD at 2023-12-31"
        );
        assert_eq!(params.len(), 5);
        assert_eq!(params[0].location, Some(0));
    }

    #[test]
    fn unknown_placeholder_fails_the_build() {
        let doc = doc_with_assets_fact();
        let suppress = SuppressionSet::empty();
        let reporter = Reporter::new(&doc, RuleTables::bundled(), &suppress);
        let args = MessageArgs::new().fact("fact1", 0, doc.fact(0));

        let err = reporter
            .render_text("${fact1.frobnicate}", &args)
            .unwrap_err();
        assert!(matches!(err, Error::Template(_)));

        let err = reporter.render_text("${fact2.value}", &args).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn report_builds_headline_hint_and_properties() {
        let doc = doc_with_assets_fact();
        let suppress = SuppressionSet::empty();
        let reporter = Reporter::new(&doc, RuleTables::bundled(), &suppress);
        let args = MessageArgs::new()
            .fact("fact1", 0, doc.fact(0))
            .fact("fact2", 0, doc.fact(0));
        let diag = reporter.report("DQC.US.0004.16", args).unwrap().unwrap();

        assert!(diag.message.starts_with("[DQC.US.0004.16] "));
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.location, Some(0));
        // Hint plus the properties block.
        assert_eq!(diag.children.len(), 2);
        assert_eq!(diag.children[0].severity, Severity::Info);
        assert_eq!(diag.children[1].severity, Severity::Other);
        assert_eq!(diag.children[1].children.len(), 4);
        assert!(diag.children[1].children[3].message.starts_with("Rule version: 5.0.0"));
    }

    #[test]
    fn scalar_arguments_render_verbatim_and_reject_properties() {
        let doc = doc_with_assets_fact();
        let suppress = SuppressionSet::empty();
        let reporter = Reporter::new(&doc, RuleTables::bundled(), &suppress);
        let args = MessageArgs::new()
            .fact("fact1", 0, doc.fact(0))
            .scalar("form", "10-K");

        let (text, _) = reporter.render_text("Form ${form}", &args).unwrap();
        assert_eq!(text, "Form 10-K");

        let err = reporter.render_text("${form.value}", &args).unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn suppression_matches_exact_and_family_codes() {
        let set = SuppressionSet::parse("DQC.US.0015.1 | DQC.US.0009").unwrap();
        assert!(set.contains("DQC.US.0015.1"));
        assert!(!set.contains("DQC.US.0015.2"));
        assert!(set.contains("DQC.US.0009.47"));
        assert!(set.contains("DQC.US.0009"));
        assert!(!set.contains("DQC.US.0004.16"));
    }

    #[test]
    fn malformed_suppression_code_is_fatal() {
        assert!(matches!(
            SuppressionSet::parse("DQC.US.15.bogus"),
            Err(Error::Config(_))
        ));
        assert!(SuppressionSet::parse("").unwrap().codes.is_empty());
    }

    #[test]
    fn suppressed_rule_produces_no_diagnostic() {
        let doc = doc_with_assets_fact();
        let suppress = SuppressionSet::parse("DQC.US.0004.16").unwrap();
        let reporter = Reporter::new(&doc, RuleTables::bundled(), &suppress);
        let args = MessageArgs::new().fact("fact1", 0, doc.fact(0));
        assert!(reporter.report("DQC.US.0004.16", args).unwrap().is_none());
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(format_numeric(&BigDecimal::from(0)), "0");
        assert_eq!(format_numeric(&BigDecimal::from(532000000)), "532,000,000");
        assert_eq!(
            format_numeric(&BigDecimal::from_str("-1234.56").unwrap()),
            "-1,234.56"
        );
        assert_eq!(format_numeric(&BigDecimal::from(999)), "999");
    }
}
