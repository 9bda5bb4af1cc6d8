use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::io::{NA, OUTPUT_DELIMITER, format_f2, format_opt_f2};
use crate::schema::v1::{FinalStage, N_STAGES, TileClass};
use crate::scores::{ClassFractions, SummaryRow, TileResult};

const IO_BUF_CAPACITY: usize = 1 << 16;

/// One tile as classified, plus whether it counted towards its slide.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedRow {
    pub tile_id: String,
    pub slide_id: String,
    pub predicted_class: TileClass,
    pub uncertainty: f64,
    pub included: bool,
}

pub fn build_detailed_rows(tiles: &[TileResult]) -> Vec<DetailedRow> {
    tiles
        .iter()
        .map(|t| DetailedRow {
            tile_id: t.tile_id.clone(),
            slide_id: t.slide_id.clone(),
            predicted_class: t.predicted_class,
            uncertainty: t.uncertainty,
            included: !t.predicted_class.is_ignore(),
        })
        .collect()
}

/// Externally delivered summary row: diagnostics removed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrimmedSummaryRow {
    pub slide_id: String,
    pub final_stage: FinalStage,
    pub fractions: Option<ClassFractions>,
}

/// Per-slide results with diagnostics still attached.
#[derive(Debug, Clone)]
pub struct SummaryTable {
    pub score_name: String,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn new(score_name: impl Into<String>, rows: Vec<SummaryRow>) -> Self {
        Self {
            score_name: score_name.into(),
            rows,
        }
    }

    pub fn trimmed(&self) -> Vec<TrimmedSummaryRow> {
        self.rows
            .iter()
            .map(|r| TrimmedSummaryRow {
                slide_id: r.slide_id.clone(),
                final_stage: r.final_stage,
                fractions: r.fractions,
            })
            .collect()
    }

    pub fn get(&self, slide_id: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.slide_id == slide_id)
    }

    pub fn n_unscored(&self) -> usize {
        self.rows.iter().filter(|r| !r.final_stage.is_scored()).count()
    }

    /// Count of slides per stage 0..4.
    pub fn stage_histogram(&self) -> [usize; N_STAGES] {
        let mut out = [0usize; N_STAGES];
        for row in &self.rows {
            if let Some(s) = row.final_stage.stage() {
                out[s as usize] += 1;
            }
        }
        out
    }

    pub fn summary_header(&self) -> String {
        let mut cols = vec!["slide_id".to_string(), self.score_name.clone()];
        cols.extend(fraction_columns());
        join(&cols[..])
    }

    pub fn audit_header(&self) -> String {
        let mut cols = vec![
            "slide_id".to_string(),
            self.score_name.clone(),
            "n_tiles".to_string(),
            "average_uncertainty".to_string(),
        ];
        cols.extend(fraction_columns());
        join(&cols[..])
    }
}

pub fn detailed_header() -> String {
    join(&["tile_id", "slide_id", "predicted_class", "uncertainty", "included"])
}

pub fn format_detailed_row(row: &DetailedRow) -> String {
    join(&[
        row.tile_id.clone(),
        row.slide_id.clone(),
        row.predicted_class.to_string(),
        format_f2(row.uncertainty),
        row.included.to_string(),
    ])
}

pub fn format_summary_row(row: &TrimmedSummaryRow) -> String {
    let mut fields = vec![row.slide_id.clone(), row.final_stage.to_string()];
    fields.extend(fraction_fields(row.fractions.as_ref()));
    join(&fields[..])
}

pub fn format_audit_row(row: &SummaryRow) -> String {
    let mut fields = vec![
        row.slide_id.clone(),
        row.final_stage.to_string(),
        row.n_tiles.to_string(),
        format_opt_f2(row.average_uncertainty),
    ];
    fields.extend(fraction_fields(row.fractions.as_ref()));
    join(&fields[..])
}

pub fn write_detailed(path: &Path, rows: &[DetailedRow]) -> Result<()> {
    let mut w = create(path)?;
    writeln!(w, "{}", detailed_header())?;
    for row in rows {
        writeln!(w, "{}", format_detailed_row(row))?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, table: &SummaryTable) -> Result<()> {
    let mut w = create(path)?;
    writeln!(w, "{}", table.summary_header())?;
    for row in table.trimmed() {
        writeln!(w, "{}", format_summary_row(&row))?;
    }
    w.flush()?;
    Ok(())
}

pub fn write_audit(path: &Path, table: &SummaryTable) -> Result<()> {
    let mut w = create(path)?;
    writeln!(w, "{}", table.audit_header())?;
    for row in &table.rows {
        writeln!(w, "{}", format_audit_row(row))?;
    }
    w.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::with_capacity(IO_BUF_CAPACITY, file))
}

fn fraction_columns() -> Vec<String> {
    (0..N_STAGES).map(|s| format!("frac_{}", s)).collect()
}

fn fraction_fields(fractions: Option<&ClassFractions>) -> Vec<String> {
    match fractions {
        Some(f) => f.values().iter().map(|v| format_f2(*v)).collect(),
        None => vec![NA.to_string(); N_STAGES],
    }
}

fn join<S: AsRef<str>>(fields: &[S]) -> String {
    let sep = OUTPUT_DELIMITER.as_char().to_string();
    fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(&sep)
}
