use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of ordinal fibrosis stages (0..=4).
pub const N_STAGES: usize = 5;

pub const CLASS_LABELS: [&str; N_STAGES + 1] = ["0", "1", "2", "3", "4", "ignore"];

/// One label of the fixed classifier label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TileClass {
    Stage0,
    Stage1,
    Stage2,
    Stage3,
    Stage4,
    Ignore,
}

impl TileClass {
    pub const ALL: [TileClass; N_STAGES + 1] = [
        TileClass::Stage0,
        TileClass::Stage1,
        TileClass::Stage2,
        TileClass::Stage3,
        TileClass::Stage4,
        TileClass::Ignore,
    ];

    /// Strict label parsing; no trimming, no case folding.
    pub fn parse(label: &str) -> Option<Self> {
        CLASS_LABELS
            .iter()
            .position(|l| *l == label)
            .map(|i| Self::ALL[i])
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        match self {
            TileClass::Stage0 => 0,
            TileClass::Stage1 => 1,
            TileClass::Stage2 => 2,
            TileClass::Stage3 => 3,
            TileClass::Stage4 => 4,
            TileClass::Ignore => 5,
        }
    }

    pub fn stage(self) -> Option<u8> {
        match self {
            TileClass::Ignore => None,
            other => Some(other.index() as u8),
        }
    }

    pub fn is_ignore(self) -> bool {
        self == TileClass::Ignore
    }

    pub fn label(self) -> &'static str {
        CLASS_LABELS[self.index()]
    }
}

impl fmt::Display for TileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for TileClass {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unrecognized class label '{}'", value))
    }
}

impl From<TileClass> for String {
    fn from(value: TileClass) -> Self {
        value.label().to_string()
    }
}

/// Slide-level outcome of the threshold engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FinalStage {
    Stage(u8),
    Unscored,
}

impl FinalStage {
    pub const UNSCORED_LABEL: &'static str = "unscored";

    pub fn stage(self) -> Option<u8> {
        match self {
            FinalStage::Stage(s) => Some(s),
            FinalStage::Unscored => None,
        }
    }

    pub fn is_scored(self) -> bool {
        matches!(self, FinalStage::Stage(_))
    }
}

impl fmt::Display for FinalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalStage::Stage(s) => write!(f, "{}", s),
            FinalStage::Unscored => f.write_str(Self::UNSCORED_LABEL),
        }
    }
}

impl TryFrom<String> for FinalStage {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == Self::UNSCORED_LABEL {
            return Ok(FinalStage::Unscored);
        }
        match value.parse::<u8>() {
            Ok(s) if (s as usize) < N_STAGES => Ok(FinalStage::Stage(s)),
            _ => Err(format!("invalid final stage '{}'", value)),
        }
    }
}

impl From<FinalStage> for String {
    fn from(value: FinalStage) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub experiment_name: String,
    pub predictions: String,
    pub classifier: String,
    pub n_tiles_total: u64,
    pub n_tiles_excluded: u64,
    pub n_slides: u64,
    pub n_unscored: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSummary {
    pub stage: u8,
    pub when: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdMeta {
    pub source: String,
    pub version: String,
    pub order: String,
    pub fallback_stage: u8,
    pub rules: Vec<RuleSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideScore {
    pub slide_id: String,
    pub final_stage: FinalStage,
    /// Index into `thresholds.rules`; absent for fallback and unscored slides.
    pub matched_rule: Option<usize>,
    pub n_tiles: u64,
    pub average_uncertainty: Option<f64>,
    pub class_counts: [u64; N_STAGES],
    pub fractions: Option<[f64; N_STAGES]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibroQcV1 {
    pub tool: String,
    pub version: String,
    pub schema_version: String,
    pub score_name: String,
    pub run: RunMeta,
    pub thresholds: Option<ThresholdMeta>,
    pub slides: Vec<SlideScore>,
    pub warnings: Vec<String>,
}

impl FibroQcV1 {
    pub fn empty(tool_version: &str, experiment_name: &str, score_name: &str) -> Self {
        Self {
            tool: "kira-fibroqc".to_string(),
            version: tool_version.to_string(),
            schema_version: "v1".to_string(),
            score_name: score_name.to_string(),
            run: RunMeta {
                experiment_name: experiment_name.to_string(),
                predictions: String::new(),
                classifier: String::new(),
                n_tiles_total: 0,
                n_tiles_excluded: 0,
                n_slides: 0,
                n_unscored: 0,
            },
            thresholds: None,
            slides: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
