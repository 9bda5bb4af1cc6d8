use anyhow::{Context, Result};

use crate::ctx::Ctx;

pub fn format_summary(ctx: &Ctx) -> Result<String> {
    let version = env!("CARGO_PKG_VERSION");
    let summary = ctx.summary.as_ref().context("summary table missing")?;
    let thresholds = ctx.thresholds.as_ref().context("thresholds not loaded")?;

    let mut out = String::new();
    out.push_str(&format!("kira-fibroqc v{}\n", version));
    out.push_str(&format!("Experiment: {}\n", ctx.config.experiment_name));
    out.push_str(&format!(
        "Thresholds: {} ({}, fallback={})\n",
        thresholds.version,
        thresholds.order.as_str(),
        thresholds.fallback_stage
    ));
    out.push_str(&format!(
        "Input: {} tiles, {} excluded, {} slides\n",
        ctx.n_tiles_seen,
        ctx.excluded_tiles.len(),
        summary.rows.len()
    ));

    let hist = summary.stage_histogram();
    let parts: Vec<String> = hist
        .iter()
        .enumerate()
        .map(|(stage, n)| format!("{}={}", stage, n))
        .collect();
    out.push_str(&format!(
        "{}: {} unscored={}\n",
        summary.score_name,
        parts.join(" "),
        summary.n_unscored()
    ));

    if ctx.write_outputs {
        out.push_str(&format!(
            "Details saved to: {}\n",
            ctx.output.detailed_path.display()
        ));
        out.push_str(&format!(
            "Summary saved to: {}\n",
            ctx.output.summary_path.display()
        ));
    }

    Ok(out)
}
