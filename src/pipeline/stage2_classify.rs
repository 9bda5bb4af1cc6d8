use anyhow::Result;
use tracing::{info, warn};

use crate::config::InvalidTilePolicy;
use crate::ctx::Ctx;
use crate::pipeline::Stage;
use crate::scores::TileResult;

pub struct Stage2Classify;

impl Stage2Classify {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for Stage2Classify {
    fn name(&self) -> &'static str {
        "stage2_classify"
    }

    fn run(&self, ctx: &mut Ctx) -> Result<()> {
        ctx.classifier.initialize()?;
        info!(classifier = ctx.classifier.name(), "classifier_initialized");

        let tiles = ctx.classifier.tiles()?;
        let policy = ctx.invalid_tile_policy();
        let mut results = Vec::with_capacity(tiles.len());
        let mut excluded = Vec::new();
        let mut warnings = Vec::new();

        for tile in &tiles {
            match ctx.classifier.classify(tile) {
                Ok(p) => results.push(TileResult {
                    tile_id: tile.tile_id.clone(),
                    slide_id: tile.slide_id.clone(),
                    predicted_class: p.class,
                    uncertainty: p.uncertainty,
                }),
                Err(err) if err.is_tile_fault() && policy == InvalidTilePolicy::Exclude => {
                    warn!(tile = %tile.tile_id, slide = %tile.slide_id, error = %err, "tile_excluded");
                    warnings.push(err.to_string());
                    excluded.push(tile.tile_id.clone());
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !excluded.is_empty() {
            warnings.push(format!(
                "{} tile(s) excluded as invalid classifier output",
                excluded.len()
            ));
        }

        info!(
            tiles = tiles.len(),
            classified = results.len(),
            excluded = excluded.len(),
            "tiles_classified"
        );
        ctx.n_tiles_seen = tiles.len();
        ctx.tiles = results;
        ctx.excluded_tiles = excluded;
        ctx.warnings.extend(warnings);
        Ok(())
    }
}
