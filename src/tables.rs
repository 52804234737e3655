// Versioned rule data tables.
//
// The bundled tables ship inside the binary; a directory of replacement
// JSON files can be supplied at run time for newer rule releases. Tables
// are pure data inputs to the engine and never computed by it.
use crate::exclusions::ExclusionRule;
use crate::{Error, Result};
use ahash::AHashMap;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;

/// Version metadata attached to every reported rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "(String, String, String)")]
pub struct RuleVersion {
    pub version: String,
    pub release_date: String,
    pub uri: String,
}

impl From<(String, String, String)> for RuleVersion {
    fn from((version, release_date, uri): (String, String, String)) -> Self {
        Self {
            version,
            release_date,
            uri,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplate {
    pub msg: String,
    #[serde(default)]
    pub hint: Option<String>,
    pub version: RuleVersion,
}

/// One "element A must be less than or equal to element B" row.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "(String, String, String, String, String)")]
pub struct ComparisonRow {
    pub rule_id: String,
    pub prefix1: String,
    pub name1: String,
    pub prefix2: String,
    pub name2: String,
}

impl From<(String, String, String, String, String)> for ComparisonRow {
    fn from(
        (rule_id, prefix1, name1, prefix2, name2): (String, String, String, String, String),
    ) -> Self {
        Self {
            rule_id,
            prefix1,
            name1,
            prefix2,
            name2,
        }
    }
}

/// One "this concept must not be negative" row.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "(String, String, String)")]
pub struct ConceptRow {
    pub rule_id: String,
    pub prefix: String,
    pub name: String,
}

impl From<(String, String, String)> for ConceptRow {
    fn from((rule_id, prefix, name): (String, String, String)) -> Self {
        Self {
            rule_id,
            prefix,
            name,
        }
    }
}

#[derive(Debug)]
pub struct RuleTables {
    templates: AHashMap<String, MessageTemplate>,
    pub period_focus_durations: AHashMap<String, (i64, i64)>,
    pub less_or_equal_rows: Vec<ComparisonRow>,
    pub non_negative_rows: Vec<ConceptRow>,
    pub member_exclusions: Vec<ExclusionRule>,
}

const MSG_TEMPLATES: &str = include_str!("../data/msg_templates.json");
const PERIOD_FOCUS_DURATIONS: &str = include_str!("../data/dqc_0006_period_focus_durations.json");
const DQC_0009_FACTS: &str = include_str!("../data/dqc_0009_facts.json");
const DQC_0015_FACTS: &str = include_str!("../data/dqc_0015_facts.json");
const DQC_0015_MEMBER_EXCLUSIONS: &str =
    include_str!("../data/dqc_0015_member_exclusions.json");

static BUNDLED: Lazy<RuleTables> = Lazy::new(|| {
    RuleTables::parse(
        MSG_TEMPLATES,
        PERIOD_FOCUS_DURATIONS,
        DQC_0009_FACTS,
        DQC_0015_FACTS,
        DQC_0015_MEMBER_EXCLUSIONS,
    )
    .expect("bundled rule tables are well-formed")
});

fn parse_table<T: serde::de::DeserializeOwned>(source: &str, name: &str) -> Result<T> {
    serde_json::from_str(source)
        .map_err(|e| Error::Config(format!("malformed rule table {}: {}", name, e)))
}

impl RuleTables {
    /// The tables compiled into the binary.
    pub fn bundled() -> &'static RuleTables {
        &BUNDLED
    }

    /// Load replacement tables from a directory holding the five standard
    /// JSON files. Any malformed file is a fatal configuration error.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let read = |file: &str| -> Result<String> {
            std::fs::read_to_string(dir.join(file)).map_err(Error::Io)
        };
        Self::parse(
            &read("msg_templates.json")?,
            &read("dqc_0006_period_focus_durations.json")?,
            &read("dqc_0009_facts.json")?,
            &read("dqc_0015_facts.json")?,
            &read("dqc_0015_member_exclusions.json")?,
        )
    }

    pub fn parse(
        templates: &str,
        durations: &str,
        less_or_equal: &str,
        non_negative: &str,
        exclusions: &str,
    ) -> Result<Self> {
        let tables = Self {
            templates: parse_table(templates, "msg_templates.json")?,
            period_focus_durations: parse_table(durations, "dqc_0006_period_focus_durations.json")?,
            less_or_equal_rows: parse_table(less_or_equal, "dqc_0009_facts.json")?,
            non_negative_rows: parse_table(non_negative, "dqc_0015_facts.json")?,
            member_exclusions: parse_table(exclusions, "dqc_0015_member_exclusions.json")?,
        };
        // Every rule the tables can fire must have a template up front;
        // discovering the gap while reporting a violation is too late.
        let rule_ids = tables
            .less_or_equal_rows
            .iter()
            .map(|r| r.rule_id.as_str())
            .chain(tables.non_negative_rows.iter().map(|r| r.rule_id.as_str()));
        for rule_id in rule_ids {
            if tables.template(rule_id).is_none() {
                return Err(Error::Config(format!(
                    "no message template for rule {}",
                    rule_id
                )));
            }
        }
        Ok(tables)
    }

    /// Template for the given rule code, falling back to the code with its
    /// trailing test number stripped. A code with no template either way is
    /// a fatal configuration error at the call site.
    pub fn template(&self, rule_id: &str) -> Option<&MessageTemplate> {
        if let Some(t) = self.templates.get(rule_id) {
            return Some(t);
        }
        let family = rule_id.rsplit_once('.')?.0;
        self.templates.get(family)
    }
}
