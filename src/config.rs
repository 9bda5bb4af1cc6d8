use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::io::Delimiter;

/// What to do with a tile whose classifier output is not a valid record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InvalidTilePolicy {
    #[default]
    Fail,
    Exclude,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierSection {
    pub predictions: Option<PathBuf>,
    pub delimiter: Option<Delimiter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdsSection {
    pub fibrosis_thresholds_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultsSection {
    pub results_path: Option<PathBuf>,
    pub experiment_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringSection {
    pub invalid_tiles: Option<InvalidTilePolicy>,
}

/// YAML run document. Every section is optional so CLI flags can fill gaps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfigDoc {
    #[serde(default)]
    pub classifier: ClassifierSection,
    #[serde(default)]
    pub thresholds: ThresholdsSection,
    #[serde(default)]
    pub results: ResultsSection,
    #[serde(default)]
    pub scoring: ScoringSection,
}

impl RunConfigDoc {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let doc: RunConfigDoc = serde_yaml::from_str(content)?;
        Ok(doc)
    }

    /// Relative paths in the document are taken relative to `base`.
    pub fn rebase(mut self, base: &Path) -> Self {
        let fix = |p: &mut Option<PathBuf>| {
            if let Some(path) = p.as_mut() {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        };
        fix(&mut self.classifier.predictions);
        fix(&mut self.thresholds.fibrosis_thresholds_json);
        fix(&mut self.results.results_path);
        self
    }
}

/// CLI values that take precedence over the document.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub predictions: Option<PathBuf>,
    pub delimiter: Option<Delimiter>,
    pub thresholds: Option<PathBuf>,
    pub results_path: Option<PathBuf>,
    pub experiment_name: Option<String>,
    pub invalid_tiles: Option<InvalidTilePolicy>,
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub predictions: PathBuf,
    pub delimiter: Delimiter,
    /// `None` selects the built-in rule set.
    pub thresholds: Option<PathBuf>,
    pub results_path: PathBuf,
    pub experiment_name: String,
    pub invalid_tiles: InvalidTilePolicy,
}

impl RunConfig {
    pub fn resolve(doc: RunConfigDoc, overrides: ConfigOverrides) -> Result<Self> {
        let predictions = overrides
            .predictions
            .or(doc.classifier.predictions)
            .context("missing classifier.predictions (or --predictions)")?;
        let results_path = overrides
            .results_path
            .or(doc.results.results_path)
            .context("missing results.results_path (or --out)")?;
        let experiment_name = overrides
            .experiment_name
            .or(doc.results.experiment_name)
            .context("missing results.experiment_name (or --experiment)")?;
        if experiment_name.trim().is_empty() {
            bail!("experiment_name must not be empty");
        }
        if experiment_name.contains(['/', '\\']) {
            bail!("experiment_name must not contain path separators");
        }

        Ok(Self {
            predictions,
            delimiter: overrides
                .delimiter
                .or(doc.classifier.delimiter)
                .unwrap_or_default(),
            thresholds: overrides.thresholds.or(doc.thresholds.fibrosis_thresholds_json),
            results_path,
            experiment_name,
            invalid_tiles: overrides
                .invalid_tiles
                .or(doc.scoring.invalid_tiles)
                .unwrap_or_default(),
        })
    }
}
