// The DQC rule catalogue.
//
// Each family is a pure function of the document, the resolved namespace
// map and the rule tables, returning its own diagnostics. Families share
// the matching, comparison and reporting primitives and are registered in
// an ordered table so suppression, iteration and selective execution are
// uniform. A family whose concepts or dimensions are not in the taxonomy
// no-ops instead of failing; heterogeneous filings are normal.
use crate::dates::{period_duration_days, period_end};
use crate::diag::Diagnostic;
use crate::exclusions::is_excluded;
use crate::matcher::{matching_facts, ConstraintSet};
use crate::message::{MessageArgs, Reporter, SuppressionSet};
use crate::model::{Concept, Document, Fact, FactId, QName};
use crate::namespaces::{standard_namespaces, NamespaceMap};
use crate::numeric::{decimal_comparison, equal_within_tolerance, less_or_equal, ComparisonPolicy};
use crate::tables::RuleTables;
use crate::Result;
use ahash::AHashMap;
use bigdecimal::num_bigint::Sign;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Everything a rule family reads. Immutable for the whole run.
pub struct RuleContext<'a> {
    pub doc: &'a Document,
    pub namespaces: &'a NamespaceMap,
    pub tables: &'a RuleTables,
    pub reporter: Reporter<'a>,
}

type RuleFn = fn(&RuleContext) -> Result<Vec<Diagnostic>>;

/// The catalogue, in reporting order.
pub const RULE_FAMILIES: [(&str, RuleFn); 7] = [
    ("DQC.US.0004", dqc_0004),
    ("DQC.US.0005", dqc_0005),
    ("DQC.US.0006", dqc_0006),
    ("DQC.US.0009", dqc_0009),
    ("DQC.US.0015", dqc_0015),
    ("DQC.US.0033", dqc_0033),
    ("DQC.US.0036", dqc_0036),
];

/// Run the whole catalogue over one document. Diagnostics come back in
/// catalogue order regardless of how families are scheduled.
pub fn validate(
    doc: &Document,
    tables: &RuleTables,
    suppress: &SuppressionSet,
) -> Result<Vec<Diagnostic>> {
    let namespaces = standard_namespaces(&doc.dts);
    if !namespaces.contains("dei") {
        tracing::debug!("dei taxonomy not loaded, skipping DQC validation");
        return Ok(Vec::new());
    }
    let ctx = RuleContext {
        doc,
        namespaces: &namespaces,
        tables,
        reporter: Reporter::new(doc, tables, suppress),
    };
    run_families(&ctx)
}

#[cfg(feature = "parallel")]
fn run_families(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    use rayon::prelude::*;
    let results: Vec<Result<Vec<Diagnostic>>> = RULE_FAMILIES
        .par_iter()
        .map(|(family, run)| {
            let diagnostics = run(ctx)?;
            tracing::debug!(family, count = diagnostics.len(), "rule family complete");
            Ok(diagnostics)
        })
        .collect();
    let mut out = Vec::new();
    for result in results {
        out.extend(result?);
    }
    Ok(out)
}

#[cfg(not(feature = "parallel"))]
fn run_families(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    for (family, run) in &RULE_FAMILIES {
        let diagnostics = run(ctx)?;
        tracing::debug!(family, count = diagnostics.len(), "rule family complete");
        out.extend(diagnostics);
    }
    Ok(out)
}

// ---- shared primitives ----------------------------------------------------

fn resolve_concept<'a>(ctx: &RuleContext<'a>, prefix: &str, name: &str) -> Option<&'a Concept> {
    let qname = ctx.namespaces.qname(prefix, name)?;
    ctx.doc.dts.resolve_concept(&qname)
}

fn legal_entity_axis<'a>(ctx: &RuleContext<'a>) -> Option<&'a Concept> {
    resolve_concept(ctx, "dei", "LegalEntityAxis")
}

/// The key a fact contributes to per-entity tables: its explicit
/// legal-entity member, else the axis default member for undimensioned
/// facts.
fn entity_key(fact: &Fact, axis: Option<&Concept>) -> Option<QName> {
    let axis = axis?;
    fact.dimension_value(&axis.qname)
        .cloned()
        .or_else(|| axis.default_member.clone())
}

/// Two-step per-entity lookup: try the fact's own legal-entity member
/// first, then fall back to the entry recorded under the axis default
/// member.
fn lookup_for_entity<'a, V>(
    table: &'a AHashMap<Option<QName>, V>,
    fact: &Fact,
    axis: Option<&Concept>,
) -> Option<&'a V> {
    let key = entity_key(fact, axis);
    if let Some(value) = table.get(&key) {
        return Some(value);
    }
    let default_key = axis.and_then(|a| a.default_member.clone());
    if default_key == key {
        return None;
    }
    table.get(&default_key)
}

/// Latest DocumentPeriodEndDate fact and context end date per legal
/// entity. The context period end is used, not the fact's value.
fn reporting_period_ends(
    ctx: &RuleContext,
) -> AHashMap<Option<QName>, (FactId, NaiveDateTime)> {
    let mut out = AHashMap::new();
    let Some(dpe) = ctx.namespaces.qname("dei", "DocumentPeriodEndDate") else {
        return out;
    };
    let axis = legal_entity_axis(ctx);
    for (id, fact) in ctx.doc.facts_for_concept(&dpe) {
        let end_date = period_end(fact);
        let entity = entity_key(fact, axis);
        match out.get(&entity) {
            Some((_, existing)) if *existing >= end_date => {}
            _ => {
                out.insert(entity, (id, end_date));
            }
        }
    }
    out
}

/// Facts whose concept lives in the given namespace, minus the ignored
/// local names.
fn facts_in_namespace<'a>(
    doc: &'a Document,
    namespace: &str,
    ignored: &[&str],
) -> Vec<(FactId, &'a Fact)> {
    doc.facts()
        .iter()
        .enumerate()
        .filter(|(_, fact)| {
            fact.concept.namespace == namespace
                && !ignored.contains(&fact.concept.local_name.as_str())
        })
        .collect()
}

/// Midnight of the day after the given calendar date: the XBRL end-of-day
/// form of a schema-typed date value.
fn schema_end_of_day(date: NaiveDate) -> Option<NaiveDateTime> {
    date.succ_opt().map(|d| d.and_time(NaiveTime::MIN))
}

/// Compare every fact of `concept1` against the facts of `concept2` that
/// share its full context, reporting each pair the policy rejects.
fn compare_fact_pairs(
    ctx: &RuleContext,
    rule_id: &str,
    concept1: &Concept,
    concept2: &Concept,
    cmp: ComparisonPolicy,
    out: &mut Vec<Diagnostic>,
) -> Result<()> {
    for (id1, fact1) in ctx.doc.facts_for_concept(&concept1.qname) {
        if fact1.is_nil() {
            continue;
        }
        let cs = ConstraintSet::from_fact(fact1).with_concept(concept2.qname.clone());
        for (id2, fact2) in matching_facts(ctx.doc, &cs, false, false) {
            if decimal_comparison(fact1, fact2, cmp) == Some(false) {
                let args = MessageArgs::new()
                    .fact("fact1", id1, fact1)
                    .fact("fact2", id2, fact2);
                if let Some(diag) = ctx.reporter.report(rule_id, args)? {
                    out.push(diag);
                }
            }
        }
    }
    Ok(())
}

// ---- DQC.US.0004: element values are equal --------------------------------

/// Concept pairs whose values must agree in equivalent contexts.
const EQUALITY_ROWS: [(&str, &str, &str, &str, &str); 1] = [(
    "DQC.US.0004.16",
    "us-gaap",
    "Assets",
    "us-gaap",
    "LiabilitiesAndStockholdersEquity",
)];

fn dqc_0004(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    for (rule_id, prefix1, name1, prefix2, name2) in EQUALITY_ROWS {
        let (Some(concept1), Some(concept2)) = (
            resolve_concept(ctx, prefix1, name1),
            resolve_concept(ctx, prefix2, name2),
        ) else {
            continue;
        };
        compare_fact_pairs(ctx, rule_id, concept1, concept2, equal_within_tolerance, &mut out)?;
    }
    Ok(out)
}

// ---- DQC.US.0005: context dates after period end date ---------------------

fn check_context_dates(
    ctx: &RuleContext,
    rule_id: &str,
    facts: &[(FactId, &Fact)],
    reporting_periods: &AHashMap<Option<QName>, (FactId, NaiveDateTime)>,
    axis: Option<&Concept>,
    ok: fn(NaiveDateTime, NaiveDateTime) -> bool,
    extra: &[(&str, &Concept)],
    out: &mut Vec<Diagnostic>,
) -> Result<()> {
    for &(id, fact) in facts {
        let Some(&(dpe_id, reporting_end)) = lookup_for_entity(reporting_periods, fact, axis)
        else {
            continue;
        };
        if !ok(period_end(fact), reporting_end) {
            let mut args = MessageArgs::new()
                .fact("fact1", id, fact)
                .fact("dei:DocumentPeriodEndDate", dpe_id, ctx.doc.fact(dpe_id));
            for &(name, concept) in extra {
                args = args.concept(name, concept);
            }
            if let Some(diag) = ctx.reporter.report(rule_id, args)? {
                out.push(diag);
            }
        }
    }
    Ok(())
}

fn dqc_0005(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    let reporting_periods = reporting_period_ends(ctx);
    let axis = legal_entity_axis(ctx);

    // .17: shares outstanding must be measured on or after the period end.
    if let Some(shares) = resolve_concept(ctx, "dei", "EntityCommonStockSharesOutstanding") {
        let facts: Vec<_> = ctx.doc.facts_for_concept(&shares.qname).collect();
        check_context_dates(
            ctx,
            "DQC.US.0005.17",
            &facts,
            &reporting_periods,
            axis,
            |end, reporting| end >= reporting,
            &[],
            &mut out,
        )?;
    }

    // .48: anything on a non-default subsequent-event member lies after it.
    if let Some(subsequent_axis) = resolve_concept(ctx, "us-gaap", "SubsequentEventTypeAxis") {
        let facts: Vec<_> = ctx
            .doc
            .facts()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.dimension_value(&subsequent_axis.qname).is_some())
            .collect();
        check_context_dates(
            ctx,
            "DQC.US.0005.48",
            &facts,
            &reporting_periods,
            axis,
            |end, reporting| end > reporting,
            &[("us-gaap:SubsequentEventTypeAxis", subsequent_axis)],
            &mut out,
        )?;
    }

    // .49: forecast-scenario facts lie after it as well.
    if let (Some(scenario_axis), Some(forecast)) = (
        resolve_concept(ctx, "us-gaap", "StatementScenarioAxis"),
        resolve_concept(ctx, "us-gaap", "ScenarioForecastMember"),
    ) {
        let facts: Vec<_> = ctx
            .doc
            .facts()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.dimension_value(&scenario_axis.qname) == Some(&forecast.qname))
            .collect();
        check_context_dates(
            ctx,
            "DQC.US.0005.49",
            &facts,
            &reporting_periods,
            axis,
            |end, reporting| end > reporting,
            &[
                ("us-gaap:StatementScenarioAxis", scenario_axis),
                ("us-gaap:ScenarioForecastMember", forecast),
            ],
            &mut out,
        )?;
    }
    Ok(out)
}

// ---- DQC.US.0006: DEI and block tag date contexts -------------------------

const DEI_DURATION_FACTS: [&str; 10] = [
    "AmendmentDescription",
    "AmendmentFlag",
    "CurrentFiscalYearEndDate",
    "DocumentPeriodEndDate",
    "DocumentFiscalYearFocus",
    "DocumentFiscalPeriodFocus",
    "DocumentType",
    "EntityRegistrantName",
    "EntityCentralIndexKey",
    "EntityFilerCategory",
];

/// Facts whose concept type is or derives from textBlockItemType, with the
/// derivation memoized per concept for this run.
fn textblock_facts<'a>(doc: &'a Document) -> Vec<(FactId, &'a Fact)> {
    let block_type = QName::new(
        "http://www.xbrl.org/dtr/type/non-numeric",
        "textBlockItemType",
    );
    if doc.dts.type_definition(&block_type).is_none() {
        return Vec::new();
    }
    let mut cache: AHashMap<&QName, bool> = AHashMap::new();
    doc.facts()
        .iter()
        .enumerate()
        .filter(|(_, fact)| {
            *cache.entry(&fact.concept).or_insert_with(|| {
                doc.dts
                    .resolve_concept(&fact.concept)
                    .and_then(|c| c.item_type.as_ref())
                    .is_some_and(|ty| doc.dts.is_derived_from(ty, &block_type))
            })
        })
        .collect()
}

fn check_durations(
    ctx: &RuleContext,
    facts: &[(FactId, &Fact)],
    focus_for_entity: &AHashMap<Option<QName>, FactId>,
    axis: Option<&Concept>,
    out: &mut Vec<Diagnostic>,
) -> Result<()> {
    for &(id, fact) in facts {
        let Some(&focus_id) = lookup_for_entity(focus_for_entity, fact, axis) else {
            continue;
        };
        let focus_fact = ctx.doc.fact(focus_id);
        let Some(focus) = focus_fact.text_value() else {
            continue;
        };
        let Some(&(min, max)) = ctx.tables.period_focus_durations.get(focus) else {
            continue;
        };
        let days = period_duration_days(fact);
        if days < min || days > max {
            let args = MessageArgs::new()
                .fact("fact1", id, fact)
                .fact("dei:DocumentFiscalPeriodFocus", focus_id, focus_fact);
            if let Some(diag) = ctx.reporter.report("DQC.US.0006.14", args)? {
                out.push(diag);
            }
        }
    }
    Ok(())
}

fn dqc_0006(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    let Some(document_type) = resolve_concept(ctx, "dei", "DocumentType") else {
        return Ok(out);
    };
    let document_types: Vec<_> = ctx.doc.facts_for_concept(&document_type.qname).collect();
    if document_types.len() != 1 {
        return Ok(out);
    }
    // Transition period filings (form names ending in T or T/A) cover
    // nonstandard spans when a filer changes fiscal year; skip them.
    let is_transition = document_types[0]
        .1
        .text_value()
        .is_some_and(|v| v.ends_with('T') || v.ends_with("T/A"));
    if is_transition {
        return Ok(out);
    }

    let axis = legal_entity_axis(ctx);
    let mut focus_for_entity: AHashMap<Option<QName>, FactId> = AHashMap::new();
    if let Some(focus) = resolve_concept(ctx, "dei", "DocumentFiscalPeriodFocus") {
        for (id, fact) in ctx.doc.facts_for_concept(&focus.qname) {
            focus_for_entity.insert(entity_key(fact, axis), id);
        }
    }

    for name in DEI_DURATION_FACTS {
        if let Some(concept) = resolve_concept(ctx, "dei", name) {
            let facts: Vec<_> = ctx.doc.facts_for_concept(&concept.qname).collect();
            check_durations(ctx, &facts, &focus_for_entity, axis, &mut out)?;
        }
    }
    check_durations(
        ctx,
        &textblock_facts(ctx.doc),
        &focus_for_entity,
        axis,
        &mut out,
    )?;
    Ok(out)
}

// ---- DQC.US.0009: element A less than or equal to element B ---------------

fn dqc_0009(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    for row in &ctx.tables.less_or_equal_rows {
        let (Some(concept1), Some(concept2)) = (
            resolve_concept(ctx, &row.prefix1, &row.name1),
            resolve_concept(ctx, &row.prefix2, &row.name2),
        ) else {
            continue;
        };
        compare_fact_pairs(ctx, &row.rule_id, concept1, concept2, less_or_equal, &mut out)?;
    }
    Ok(out)
}

// ---- DQC.US.0015: negative values -----------------------------------------

fn dqc_0015(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    for row in &ctx.tables.non_negative_rows {
        let Some(concept) = resolve_concept(ctx, &row.prefix, &row.name) else {
            continue;
        };
        for (id, fact) in ctx.doc.facts_for_concept(&concept.qname) {
            if fact.is_nil() {
                continue;
            }
            let Some(value) = fact.numeric_value() else {
                continue;
            };
            if value.sign() == Sign::Minus && !is_excluded(fact, &ctx.tables.member_exclusions) {
                let args = MessageArgs::new().fact("fact1", id, fact);
                if let Some(diag) = ctx.reporter.report(&row.rule_id, args)? {
                    out.push(diag);
                }
            }
        }
    }
    Ok(out)
}

// ---- DQC.US.0033: document period end date context ------------------------

const DQC_0033_IGNORED: [&str; 5] = [
    "EntityCommonStockSharesOutstanding",
    "EntityPublicFloat",
    "DocumentPeriodEndDate",
    "EntityNumberOfEmployees",
    "EntityListingDepositoryReceiptRatio",
];

fn dqc_0033(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    let Some(dei_namespace) = ctx.namespaces.get("dei") else {
        return Ok(out);
    };
    let axis = legal_entity_axis(ctx);

    // Per entity: the period-end fact and whether its own value agrees
    // with its context (within 3 days). Facts whose value is not a schema
    // date leave the check inapplicable for that entity.
    let mut reporting: AHashMap<Option<QName>, (FactId, bool)> = AHashMap::new();
    if let Some(dpe) = ctx.namespaces.qname("dei", "DocumentPeriodEndDate") {
        for (id, fact) in ctx.doc.facts_for_concept(&dpe) {
            let Some(value_date) = fact.date_value() else {
                continue;
            };
            let Some(value_end) = schema_end_of_day(value_date) else {
                continue;
            };
            let is_valid = (value_end - period_end(fact)).num_days().abs() <= 3;
            reporting.insert(entity_key(fact, axis), (id, is_valid));
        }
    }

    for (id, fact) in facts_in_namespace(ctx.doc, dei_namespace, &DQC_0033_IGNORED) {
        let Some(&(dpe_id, is_valid)) = lookup_for_entity(&reporting, fact, axis) else {
            continue;
        };
        if is_valid && period_end(fact) != period_end(ctx.doc.fact(dpe_id)) {
            let args = MessageArgs::new()
                .fact("fact1", id, fact)
                .fact("dei:DocumentPeriodEndDate", dpe_id, ctx.doc.fact(dpe_id));
            if let Some(diag) = ctx.reporter.report("DQC.US.0033.2", args)? {
                out.push(diag);
            }
        }
    }
    Ok(out)
}

// ---- DQC.US.0036: document period end date / fact value check -------------

fn dqc_0036(ctx: &RuleContext) -> Result<Vec<Diagnostic>> {
    let mut out = Vec::new();
    let Some(dpe) = ctx.namespaces.qname("dei", "DocumentPeriodEndDate") else {
        return Ok(out);
    };
    for (id, fact) in ctx.doc.facts_for_concept(&dpe) {
        let Some(value_date) = fact.date_value() else {
            continue;
        };
        let Some(value_end) = schema_end_of_day(value_date) else {
            continue;
        };
        if (value_end - period_end(fact)).num_days().abs() > 3 {
            let args = MessageArgs::new().fact("fact1", id, fact);
            if let Some(diag) = ctx.reporter.report("DQC.US.0036.1", args)? {
                out.push(diag);
            }
        }
    }
    Ok(out)
}
