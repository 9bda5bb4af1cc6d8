use std::collections::BTreeMap;

use anyhow::Result;
use tracing::debug;

#[cfg(feature = "mt")]
use rayon::prelude::*;

use crate::math::stats::stable_mean;
use crate::schema::v1::N_STAGES;
use crate::scores::{SlideAggregate, TileResult};

/// Groups tiles by slide and tallies the non-ignore class distribution.
///
/// Output is ordered by `slide_id`, so it is identical for any permutation
/// of `tiles`. Slides whose tiles are all `ignore` are kept with
/// `n_tiles == 0`.
pub fn aggregate_slides(tiles: &[TileResult], threads: usize) -> Result<Vec<SlideAggregate>> {
    let partitions = partition_by_slide(tiles);
    debug!(slides = partitions.len(), tiles = tiles.len(), "partitioned");

    #[cfg(feature = "mt")]
    {
        if threads != 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build thread pool: {}", e))?;
            let out = pool.install(|| {
                partitions
                    .par_iter()
                    .map(|(slide_id, rows)| aggregate_slide(slide_id, rows))
                    .collect::<Vec<_>>()
            });
            return Ok(out);
        }
    }
    #[cfg(not(feature = "mt"))]
    let _ = threads;

    Ok(partitions
        .iter()
        .map(|(slide_id, rows)| aggregate_slide(slide_id, rows))
        .collect())
}

fn partition_by_slide(tiles: &[TileResult]) -> Vec<(String, Vec<&TileResult>)> {
    let mut map: BTreeMap<&str, Vec<&TileResult>> = BTreeMap::new();
    for tile in tiles {
        map.entry(tile.slide_id.as_str()).or_default().push(tile);
    }
    map.into_iter()
        .map(|(id, rows)| (id.to_string(), rows))
        .collect()
}

pub fn aggregate_slide(slide_id: &str, rows: &[&TileResult]) -> SlideAggregate {
    let mut class_counts = [0u64; N_STAGES];
    let mut n_ignored = 0u64;
    let mut uncertainties = Vec::with_capacity(rows.len());

    for tile in rows {
        match tile.predicted_class.stage() {
            Some(stage) => {
                class_counts[stage as usize] += 1;
                uncertainties.push(tile.uncertainty);
            }
            None => n_ignored += 1,
        }
    }

    SlideAggregate {
        slide_id: slide_id.to_string(),
        class_counts,
        n_tiles: uncertainties.len() as u64,
        n_ignored,
        average_uncertainty: stable_mean(&uncertainties),
    }
}
