use anyhow::Result;
use tracing::info;

use crate::ctx::Ctx;
use crate::io::json_writer;
use crate::io::tables::build_detailed_rows;
use crate::pipeline::Stage;

pub struct Stage5Report;

impl Stage5Report {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage5Report {
    fn name(&self) -> &'static str {
        "stage5_report"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        ctx.detailed = build_detailed_rows(&ctx.tiles);
        let report = json_writer::build_report(ctx)?;
        ctx.report = report;
        info!(rows = ctx.detailed.len(), "report_ready");
        Ok(())
    }
}
