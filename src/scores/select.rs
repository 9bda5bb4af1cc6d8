use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::Result;

#[cfg(feature = "mt")]
use rayon::prelude::*;

use crate::error::ScoreError;
use crate::scores::{SlideAggregate, SummaryRow};
use crate::thresholds::ThresholdSet;

/// Cooperative cancellation, checked between slides.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn score_slide(slide: &SlideAggregate, thresholds: &ThresholdSet) -> SummaryRow {
    let (final_stage, matched_rule) = thresholds.score_slide(slide);
    SummaryRow {
        slide_id: slide.slide_id.clone(),
        final_stage,
        matched_rule,
        n_tiles: slide.n_tiles,
        average_uncertainty: slide.average_uncertainty,
        class_counts: slide.class_counts,
        fractions: slide.fractions(),
    }
}

/// Scores every slide, preserving the order of `slides`.
pub fn score_slides(
    slides: &[SlideAggregate],
    thresholds: &ThresholdSet,
    cancel: &CancelFlag,
    threads: usize,
) -> Result<Vec<SummaryRow>> {
    let total = slides.len();
    let scored = AtomicUsize::new(0);
    let score_one = |slide: &SlideAggregate| -> Result<SummaryRow, ScoreError> {
        if cancel.is_cancelled() {
            return Err(ScoreError::Cancelled {
                scored: scored.load(Ordering::SeqCst),
                total,
            });
        }
        let row = score_slide(slide, thresholds);
        scored.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    };

    #[cfg(feature = "mt")]
    {
        if threads != 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build thread pool: {}", e))?;
            let rows = pool.install(|| {
                slides
                    .par_iter()
                    .map(&score_one)
                    .collect::<Result<Vec<_>, _>>()
            })?;
            return Ok(rows);
        }
    }
    #[cfg(not(feature = "mt"))]
    let _ = threads;

    let rows = slides
        .iter()
        .map(&score_one)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
