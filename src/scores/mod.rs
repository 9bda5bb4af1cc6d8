pub mod aggregate;
pub mod select;

use crate::math::stats::fraction;
use crate::schema::v1::{FinalStage, N_STAGES, TileClass};

/// One classified tile as produced by the classifier capability.
#[derive(Debug, Clone, PartialEq)]
pub struct TileResult {
    pub tile_id: String,
    pub slide_id: String,
    pub predicted_class: TileClass,
    pub uncertainty: f64,
}

/// Per-slide class distribution over non-ignore tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideAggregate {
    pub slide_id: String,
    pub class_counts: [u64; N_STAGES],
    pub n_tiles: u64,
    /// Tiles of this slide labelled `ignore`; not part of `n_tiles`.
    pub n_ignored: u64,
    pub average_uncertainty: Option<f64>,
}

impl SlideAggregate {
    /// Fractions are undefined for a slide with no scorable tiles.
    pub fn fractions(&self) -> Option<ClassFractions> {
        ClassFractions::from_counts(self.class_counts)
    }

    pub fn is_empty(&self) -> bool {
        self.n_tiles == 0
    }
}

/// Fraction of scorable tiles per stage class.
///
/// Kept as counts so that grouped fractions (`>=3`, `1+2`) are a single
/// division rather than a sum of rounded terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassFractions {
    counts: [u64; N_STAGES],
    total: u64,
}

impl ClassFractions {
    pub fn from_counts(counts: [u64; N_STAGES]) -> Option<Self> {
        let total: u64 = counts.iter().sum();
        if total == 0 {
            None
        } else {
            Some(Self { counts, total })
        }
    }

    pub fn values(&self) -> [f64; N_STAGES] {
        let mut out = [0.0f64; N_STAGES];
        for (v, &c) in out.iter_mut().zip(self.counts.iter()) {
            *v = self.ratio(c);
        }
        out
    }

    pub fn frac(&self, stage: u8) -> f64 {
        self.ratio(self.counts.get(stage as usize).copied().unwrap_or(0))
    }

    pub fn frac_at_least(&self, stage: u8) -> f64 {
        self.ratio(self.counts.iter().skip(stage as usize).sum())
    }

    pub fn frac_at_most(&self, stage: u8) -> f64 {
        self.ratio(self.counts.iter().take(stage as usize + 1).sum())
    }

    pub fn frac_of(&self, stages: &[u8]) -> f64 {
        let mut seen = [false; N_STAGES];
        let mut count = 0u64;
        for &s in stages {
            if let Some(slot) = seen.get_mut(s as usize) {
                if !*slot {
                    *slot = true;
                    count += self.counts[s as usize];
                }
            }
        }
        self.ratio(count)
    }

    fn ratio(&self, count: u64) -> f64 {
        // total > 0 by construction
        fraction(count, self.total).unwrap_or(0.0)
    }
}

/// Final per-slide row, diagnostics included.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub slide_id: String,
    pub final_stage: FinalStage,
    pub matched_rule: Option<usize>,
    pub n_tiles: u64,
    pub average_uncertainty: Option<f64>,
    pub class_counts: [u64; N_STAGES],
    pub fractions: Option<ClassFractions>,
}
