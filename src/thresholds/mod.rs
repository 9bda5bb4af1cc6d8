mod expr;
mod loader;

pub use expr::{CmpOp, Predicate, Selector};
pub use loader::{
    BUILTIN_SOURCE, ThresholdDoc, load_builtin, load_threshold_json, parse_threshold_json,
};

use crate::schema::v1::{FinalStage, RuleSummary, ThresholdMeta};
use crate::scores::{ClassFractions, SlideAggregate};

/// Direction in which rules are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrder {
    MostSevereFirst,
    LeastSevereFirst,
}

impl RuleOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "most_severe_first" | "descending" => Some(Self::MostSevereFirst),
            "least_severe_first" | "ascending" => Some(Self::LeastSevereFirst),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MostSevereFirst => "most_severe_first",
            Self::LeastSevereFirst => "least_severe_first",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub stage: u8,
    pub predicate: Predicate,
}

/// Outcome of evaluating one fraction vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageDecision {
    Matched { stage: u8, rule: usize },
    Fallback { stage: u8 },
}

impl StageDecision {
    pub fn stage(self) -> u8 {
        match self {
            StageDecision::Matched { stage, .. } | StageDecision::Fallback { stage } => stage,
        }
    }

    pub fn rule(self) -> Option<usize> {
        match self {
            StageDecision::Matched { rule, .. } => Some(rule),
            StageDecision::Fallback { .. } => None,
        }
    }
}

/// Validated, immutable rule set for one run.
///
/// `rules` is stored in evaluation order; the first satisfied predicate
/// decides the stage and anything unmatched gets `fallback_stage`.
#[derive(Debug, Clone)]
pub struct ThresholdSet {
    pub source: String,
    pub version: String,
    pub score_name: String,
    pub order: RuleOrder,
    pub fallback_stage: u8,
    rules: Vec<ThresholdRule>,
}

impl ThresholdSet {
    /// Orders `rules` by stage per `order`. Callers are expected to have
    /// validated stages; see [`parse_threshold_json`].
    pub fn new(
        source: String,
        version: String,
        score_name: String,
        order: RuleOrder,
        fallback_stage: u8,
        mut rules: Vec<ThresholdRule>,
    ) -> Self {
        match order {
            RuleOrder::MostSevereFirst => rules.sort_by(|a, b| b.stage.cmp(&a.stage)),
            RuleOrder::LeastSevereFirst => rules.sort_by(|a, b| a.stage.cmp(&b.stage)),
        }
        Self {
            source,
            version,
            score_name,
            order,
            fallback_stage,
            rules,
        }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn select(&self, fractions: &ClassFractions) -> StageDecision {
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.predicate.eval(fractions) {
                return StageDecision::Matched {
                    stage: rule.stage,
                    rule: idx,
                };
            }
        }
        StageDecision::Fallback {
            stage: self.fallback_stage,
        }
    }

    /// Empty slides are `Unscored`; everything else gets exactly one stage.
    pub fn score_slide(&self, slide: &SlideAggregate) -> (FinalStage, Option<usize>) {
        match slide.fractions() {
            Some(f) => {
                let decision = self.select(&f);
                (FinalStage::Stage(decision.stage()), decision.rule())
            }
            None => (FinalStage::Unscored, None),
        }
    }

    pub fn meta(&self) -> ThresholdMeta {
        ThresholdMeta {
            source: self.source.clone(),
            version: self.version.clone(),
            order: self.order.as_str().to_string(),
            fallback_stage: self.fallback_stage,
            rules: self
                .rules
                .iter()
                .map(|r| RuleSummary {
                    stage: r.stage,
                    when: r.predicate.to_string(),
                })
                .collect(),
        }
    }
}
