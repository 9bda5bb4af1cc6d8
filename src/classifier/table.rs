use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Result, bail};
use tracing::info;

use crate::classifier::{TileClassifier, TilePrediction, TileRef};
use crate::error::ScoreError;
use crate::io::{Delimiter, OUTPUT_DELIMITER, is_plain_field, open_maybe_gz};
use crate::schema::v1::{CLASS_LABELS, TileClass};

#[derive(Debug, Clone)]
enum RawPrediction {
    Labelled { label: String, uncertainty: String },
    Scores(Vec<String>),
}

#[derive(Debug, Clone)]
struct RawRow {
    tile: TileRef,
    line_no: usize,
    prediction: RawPrediction,
}

#[derive(Debug, Clone, Copy)]
enum Layout {
    Labelled { class_col: usize, unc_col: usize },
    Scores { cols: [usize; 6] },
}

/// Classifier backed by a delimited table of model outputs.
///
/// The table is only read in [`TileClassifier::initialize`]. Structural
/// defects (missing columns, ragged rows, duplicate tile ids) fail the load;
/// bad values in a row surface per tile from `classify`.
#[derive(Debug)]
pub struct PredictionTable {
    path: PathBuf,
    delimiter: Delimiter,
    rows: Vec<RawRow>,
    index: HashMap<String, usize>,
    initialized: bool,
}

impl PredictionTable {
    pub fn new(path: impl Into<PathBuf>, delimiter: Delimiter) -> Self {
        Self {
            path: path.into(),
            delimiter,
            rows: Vec::new(),
            index: HashMap::new(),
            initialized: false,
        }
    }

    fn load(&mut self) -> Result<()> {
        let reader = BufReader::new(open_maybe_gz(&self.path)?);
        let source = self.path.display().to_string();
        let sep = self.delimiter.as_char();

        let mut lines = reader.lines().enumerate();
        let header = loop {
            match lines.next() {
                Some((_, line)) => {
                    let line = line?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    break trimmed.to_string();
                }
                None => bail!("{}: empty prediction table", source),
            }
        };
        let columns: Vec<&str> = header.split(sep).map(str::trim).collect();
        let find = |name: &str| columns.iter().position(|c| *c == name);

        let tile_col = find("tile_id")
            .ok_or_else(|| anyhow::anyhow!("{}: missing column 'tile_id'", source))?;
        let slide_col = find("slide_id")
            .ok_or_else(|| anyhow::anyhow!("{}: missing column 'slide_id'", source))?;

        let layout = match (find("predicted_class"), find("uncertainty")) {
            (Some(class_col), Some(unc_col)) => Layout::Labelled { class_col, unc_col },
            _ => {
                let mut cols = [0usize; 6];
                for (slot, label) in cols.iter_mut().zip(CLASS_LABELS.iter()) {
                    *slot = find(&format!("p_{}", label)).ok_or_else(|| {
                        anyhow::anyhow!(
                            "{}: need predicted_class+uncertainty or p_0..p_4,p_ignore columns",
                            source
                        )
                    })?;
                }
                Layout::Scores { cols }
            }
        };

        let mut rows = Vec::new();
        let mut index = HashMap::new();
        for (idx, line) in lines {
            let line_no = idx + 1;
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(sep).map(str::trim).collect();
            if fields.len() != columns.len() {
                bail!(
                    "{}:{} expected {} columns, found {}",
                    source,
                    line_no,
                    columns.len(),
                    fields.len()
                );
            }
            let tile_id = fields[tile_col];
            let slide_id = fields[slide_col];
            if tile_id.is_empty() || slide_id.is_empty() {
                bail!("{}:{} empty tile_id or slide_id", source, line_no);
            }
            if !is_plain_field(tile_id) || !is_plain_field(slide_id) {
                bail!(
                    "{}:{} tile_id/slide_id must not contain '{}'",
                    source,
                    line_no,
                    OUTPUT_DELIMITER.as_char()
                );
            }
            if index.contains_key(tile_id) {
                bail!("{}:{} duplicate tile_id '{}'", source, line_no, tile_id);
            }
            let prediction = match layout {
                Layout::Labelled { class_col, unc_col } => RawPrediction::Labelled {
                    label: fields[class_col].to_string(),
                    uncertainty: fields[unc_col].to_string(),
                },
                Layout::Scores { cols } => {
                    RawPrediction::Scores(cols.iter().map(|&c| fields[c].to_string()).collect())
                }
            };
            index.insert(tile_id.to_string(), rows.len());
            rows.push(RawRow {
                tile: TileRef {
                    tile_id: tile_id.to_string(),
                    slide_id: slide_id.to_string(),
                },
                line_no,
                prediction,
            });
        }

        info!(
            path = %self.path.display(),
            tiles = rows.len(),
            "prediction_table_loaded"
        );
        self.rows = rows;
        self.index = index;
        Ok(())
    }

    fn decode(row: &RawRow) -> Result<TilePrediction, ScoreError> {
        let tile_id = row.tile.tile_id.as_str();
        match &row.prediction {
            RawPrediction::Labelled { label, uncertainty } => {
                let class = TileClass::parse(label).ok_or_else(|| ScoreError::InvalidClass {
                    tile_id: tile_id.to_string(),
                    label: label.clone(),
                })?;
                let value = parse_number(tile_id, row.line_no, "uncertainty", uncertainty)?;
                TilePrediction::new(tile_id, class, value)
            }
            RawPrediction::Scores(values) => {
                let mut scores = [0.0f64; 6];
                for ((slot, raw), label) in scores.iter_mut().zip(values).zip(CLASS_LABELS) {
                    *slot = parse_number(tile_id, row.line_no, &format!("p_{}", label), raw)?;
                }
                TilePrediction::from_probabilities(tile_id, &scores)
            }
        }
    }
}

fn parse_number(tile_id: &str, line_no: usize, column: &str, raw: &str) -> Result<f64, ScoreError> {
    raw.parse::<f64>().map_err(|_| {
        ScoreError::invalid_tile(
            tile_id,
            format!("line {}: {} '{}' is not a number", line_no, column, raw),
        )
    })
}

impl TileClassifier for PredictionTable {
    fn name(&self) -> &str {
        "prediction-table"
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        self.load()?;
        self.initialized = true;
        Ok(())
    }

    fn tiles(&self) -> Result<Vec<TileRef>, ScoreError> {
        if !self.initialized {
            return Err(ScoreError::ClassifierNotInitialized(self.name().to_string()));
        }
        Ok(self.rows.iter().map(|r| r.tile.clone()).collect())
    }

    fn classify(&self, tile: &TileRef) -> Result<TilePrediction, ScoreError> {
        if !self.initialized {
            return Err(ScoreError::ClassifierNotInitialized(self.name().to_string()));
        }
        let row = self
            .index
            .get(&tile.tile_id)
            .and_then(|&i| self.rows.get(i))
            .ok_or_else(|| ScoreError::invalid_tile(&tile.tile_id, "no prediction for tile"))?;
        Self::decode(row)
    }
}
