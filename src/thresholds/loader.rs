use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ScoreError;
use crate::io::is_plain_field;
use crate::schema::v1::N_STAGES;
use crate::thresholds::{Predicate, RuleOrder, ThresholdRule, ThresholdSet};

pub const BUILTIN_SOURCE: &str = "built-in fibrosis_v1";

const DEFAULT_SCORE_NAME: &str = "Fibrosis_score";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdDoc {
    pub version: Option<String>,
    pub score_name: Option<String>,
    pub order: Option<String>,
    pub fallback_stage: Option<i64>,
    pub rules: Option<Vec<RuleDoc>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDoc {
    pub stage: Option<i64>,
    pub when: Option<String>,
}

pub fn load_builtin() -> Result<ThresholdSet, ScoreError> {
    let content = include_str!("../../assets/thresholds/fibrosis_v1.json");
    parse_threshold_json(content, BUILTIN_SOURCE)
}

pub fn load_threshold_json(path: &Path) -> Result<ThresholdSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read threshold file {}", path.display()))?;
    let set = parse_threshold_json(&content, &path.display().to_string())?;
    Ok(set)
}

/// Parses and validates a threshold document. Any defect rejects the whole
/// document; a partially valid rule set is never returned.
pub fn parse_threshold_json(content: &str, source: &str) -> Result<ThresholdSet, ScoreError> {
    let doc: ThresholdDoc = serde_json::from_str(content)
        .map_err(|e| ScoreError::threshold(source, format!("malformed document: {}", e)))?;

    let order = match doc.order.as_deref() {
        None => RuleOrder::MostSevereFirst,
        Some(s) => RuleOrder::parse(s)
            .ok_or_else(|| ScoreError::threshold(source, format!("unknown order '{}'", s)))?,
    };

    let score_name = doc
        .score_name
        .unwrap_or_else(|| DEFAULT_SCORE_NAME.to_string());
    check_score_name(&score_name).map_err(|m| ScoreError::threshold(source, m))?;

    let fallback_raw = doc
        .fallback_stage
        .ok_or_else(|| ScoreError::threshold(source, "missing fallback_stage"))?;
    let fallback_stage = stage_in_range(fallback_raw)
        .ok_or_else(|| ScoreError::threshold(source, format!("fallback_stage {} outside 0..4", fallback_raw)))?;

    let rule_docs = doc
        .rules
        .ok_or_else(|| ScoreError::threshold(source, "missing rules"))?;
    if rule_docs.is_empty() {
        return Err(ScoreError::threshold(source, "rules must not be empty"));
    }

    let mut seen = BTreeSet::new();
    let mut rules = Vec::with_capacity(rule_docs.len());
    for (idx, rule) in rule_docs.into_iter().enumerate() {
        let n = idx + 1;
        let raw = rule
            .stage
            .ok_or_else(|| ScoreError::threshold(source, format!("rule {}: missing stage", n)))?;
        let stage = stage_in_range(raw).ok_or_else(|| {
            ScoreError::threshold(source, format!("rule {}: stage {} outside 0..4", n, raw))
        })?;
        if !seen.insert(stage) {
            return Err(ScoreError::threshold(
                source,
                format!("rule {}: duplicate stage {}", n, stage),
            ));
        }
        let when = rule.when.ok_or_else(|| {
            ScoreError::threshold(source, format!("rule {}: missing predicate 'when'", n))
        })?;
        let predicate = Predicate::parse(&when).map_err(|e| {
            ScoreError::threshold(source, format!("rule {} (stage {}): {}", n, stage, e))
        })?;
        rules.push(ThresholdRule { stage, predicate });
    }

    Ok(ThresholdSet::new(
        source.to_string(),
        doc.version.unwrap_or_else(|| "unversioned".to_string()),
        score_name,
        order,
        fallback_stage,
        rules,
    ))
}

/// `score_name` ends up in an output file name and a table header.
fn check_score_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("score_name must not be empty".to_string());
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(format!("score_name '{}' must not contain a path", name));
    }
    if !is_plain_field(name) {
        return Err(format!(
            "score_name '{}' must not contain the output separator or line breaks",
            name
        ));
    }
    Ok(())
}

fn stage_in_range(raw: i64) -> Option<u8> {
    if raw >= 0 && (raw as usize) < N_STAGES {
        Some(raw as u8)
    } else {
        None
    }
}
