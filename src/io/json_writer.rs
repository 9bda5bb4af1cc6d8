use std::path::Path;

use anyhow::{Context, Result};

use crate::ctx::Ctx;
use crate::schema::v1::{FibroQcV1, RunMeta, SlideScore};

pub fn build_report(ctx: &Ctx) -> Result<FibroQcV1> {
    let summary = ctx.summary.as_ref().context("summary table missing")?;

    let slides = summary
        .rows
        .iter()
        .map(|r| SlideScore {
            slide_id: r.slide_id.clone(),
            final_stage: r.final_stage,
            matched_rule: r.matched_rule,
            n_tiles: r.n_tiles,
            average_uncertainty: r.average_uncertainty,
            class_counts: r.class_counts,
            fractions: r.fractions.map(|f| f.values()),
        })
        .collect::<Vec<_>>();

    let run = RunMeta {
        experiment_name: ctx.config.experiment_name.clone(),
        predictions: ctx.config.predictions.display().to_string(),
        classifier: ctx.classifier.name().to_string(),
        n_tiles_total: ctx.n_tiles_seen as u64,
        n_tiles_excluded: ctx.excluded_tiles.len() as u64,
        n_slides: summary.rows.len() as u64,
        n_unscored: summary.n_unscored() as u64,
    };

    Ok(FibroQcV1 {
        tool: ctx.report.tool.clone(),
        version: ctx.report.version.clone(),
        schema_version: "v1".to_string(),
        score_name: summary.score_name.clone(),
        run,
        thresholds: ctx.thresholds.as_ref().map(|t| t.meta()),
        slides,
        warnings: ctx.warnings.clone(),
    })
}

pub fn write_json(path: &Path, report: &FibroQcV1) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}
