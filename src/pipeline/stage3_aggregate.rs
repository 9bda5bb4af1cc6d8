use anyhow::Result;
use tracing::info;

use crate::ctx::Ctx;
use crate::pipeline::Stage;
use crate::scores::aggregate::aggregate_slides;

pub struct Stage3Aggregate;

impl Stage3Aggregate {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage3Aggregate {
    fn name(&self) -> &'static str {
        "stage3_aggregate"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let aggregates = aggregate_slides(&ctx.tiles, ctx.threads)?;
        let empty = aggregates.iter().filter(|a| a.is_empty()).count();
        for agg in aggregates.iter().filter(|a| a.is_empty()) {
            ctx.warnings.push(format!(
                "slide {} has no scorable tiles ({} ignored)",
                agg.slide_id, agg.n_ignored
            ));
        }
        info!(slides = aggregates.len(), empty_slides = empty, "slides_aggregated");
        ctx.aggregates = aggregates;
        Ok(())
    }
}
