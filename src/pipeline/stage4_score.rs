use anyhow::{Context, Result};
use tracing::info;

use crate::ctx::Ctx;
use crate::io::tables::SummaryTable;
use crate::pipeline::Stage;
use crate::scores::select::score_slides;

pub struct Stage4Score;

impl Stage4Score {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage4Score {
    fn name(&self) -> &'static str {
        "stage4_score"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let thresholds = ctx
            .thresholds
            .as_ref()
            .context("thresholds not loaded before scoring")?;
        let rows = score_slides(&ctx.aggregates, thresholds, &ctx.cancel, ctx.threads)?;
        let table = SummaryTable::new(thresholds.score_name.clone(), rows);
        info!(
            slides = table.rows.len(),
            unscored = table.n_unscored(),
            "slides_scored"
        );
        ctx.summary = Some(table);
        Ok(())
    }
}
