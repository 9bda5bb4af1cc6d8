use std::path::PathBuf;

use crate::classifier::TileClassifier;
use crate::config::{InvalidTilePolicy, RunConfig};
use crate::io::tables::{DetailedRow, SummaryTable};
use crate::schema::v1::FibroQcV1;
use crate::scores::select::CancelFlag;
use crate::scores::{SlideAggregate, TileResult};
use crate::thresholds::ThresholdSet;

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub out_dir: PathBuf,
    pub detailed_path: PathBuf,
    pub summary_path: PathBuf,
    pub audit_path: PathBuf,
    pub json_path: PathBuf,
}

impl OutputPaths {
    pub fn new(out_dir: PathBuf, experiment_name: &str, score_name: &str) -> Self {
        Self {
            detailed_path: out_dir.join(format!("{}_{}.csv", experiment_name, score_name)),
            summary_path: out_dir.join(format!("{}_summary.csv", experiment_name)),
            audit_path: out_dir.join(format!("{}_summary_audit.csv", experiment_name)),
            json_path: out_dir.join(format!("{}_report.json", experiment_name)),
            out_dir,
        }
    }
}

/// State threaded through the pipeline stages of one run.
pub struct Ctx {
    pub config: RunConfig,
    pub classifier: Box<dyn TileClassifier>,
    pub write_outputs: bool,
    pub write_json: bool,
    pub write_audit: bool,
    pub threads: usize,
    pub cancel: CancelFlag,
    pub thresholds: Option<ThresholdSet>,
    pub tiles: Vec<TileResult>,
    pub n_tiles_seen: usize,
    pub excluded_tiles: Vec<String>,
    pub aggregates: Vec<SlideAggregate>,
    pub detailed: Vec<DetailedRow>,
    pub summary: Option<SummaryTable>,
    pub warnings: Vec<String>,
    pub output: OutputPaths,
    pub report: FibroQcV1,
}

impl Ctx {
    pub fn new(config: RunConfig, classifier: Box<dyn TileClassifier>, tool_version: &str) -> Self {
        // Score name is only known once thresholds load; stage1 refreshes paths.
        let score_name = "Fibrosis_score";
        let output = OutputPaths::new(
            config.results_path.clone(),
            &config.experiment_name,
            score_name,
        );
        let report = FibroQcV1::empty(tool_version, &config.experiment_name, score_name);
        Self {
            config,
            classifier,
            write_outputs: true,
            write_json: false,
            write_audit: false,
            threads: 0,
            cancel: CancelFlag::new(),
            thresholds: None,
            tiles: Vec::new(),
            n_tiles_seen: 0,
            excluded_tiles: Vec::new(),
            aggregates: Vec::new(),
            detailed: Vec::new(),
            summary: None,
            warnings: Vec::new(),
            output,
            report,
        }
    }

    pub fn invalid_tile_policy(&self) -> InvalidTilePolicy {
        self.config.invalid_tiles
    }

    pub fn score_name(&self) -> &str {
        self.thresholds
            .as_ref()
            .map(|t| t.score_name.as_str())
            .unwrap_or("Fibrosis_score")
    }
}
