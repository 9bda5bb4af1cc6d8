use anyhow::{Context, Result};
use tracing::info;

use crate::ctx::Ctx;
use crate::io::{json_writer, tables};
use crate::pipeline::Stage;

pub struct Stage6Output;

impl Stage6Output {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage6Output {
    fn name(&self) -> &'static str {
        "stage6_output"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        if !ctx.write_outputs {
            return Ok(());
        }
        let summary = ctx.summary.as_ref().context("summary table missing")?;

        tables::write_detailed(&ctx.output.detailed_path, &ctx.detailed)?;
        info!(path = %ctx.output.detailed_path.display(), "detailed_written");

        tables::write_summary(&ctx.output.summary_path, summary)?;
        info!(path = %ctx.output.summary_path.display(), "summary_written");

        if ctx.write_audit {
            tables::write_audit(&ctx.output.audit_path, summary)?;
            info!(path = %ctx.output.audit_path.display(), "audit_written");
        }
        if ctx.write_json {
            json_writer::write_json(&ctx.output.json_path, &ctx.report)?;
            info!(path = %ctx.output.json_path.display(), "json_written");
        }
        Ok(())
    }
}
