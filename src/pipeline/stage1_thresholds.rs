use anyhow::Result;
use tracing::info;

use crate::ctx::{Ctx, OutputPaths};
use crate::pipeline::Stage;
use crate::thresholds::{load_builtin, load_threshold_json};

pub struct Stage1Thresholds;

impl Stage1Thresholds {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage1Thresholds {
    fn name(&self) -> &'static str {
        "stage1_thresholds"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        let set = match &ctx.config.thresholds {
            Some(path) => load_threshold_json(path)?,
            None => load_builtin()?,
        };
        info!(
            source = %set.source,
            version = %set.version,
            rules = set.rules().len(),
            order = set.order.as_str(),
            fallback = set.fallback_stage,
            "thresholds_loaded"
        );

        ctx.output = OutputPaths::new(
            ctx.output.out_dir.clone(),
            &ctx.config.experiment_name,
            &set.score_name,
        );
        ctx.report.score_name = set.score_name.clone();
        ctx.report.thresholds = Some(set.meta());
        ctx.thresholds = Some(set);
        Ok(())
    }
}
