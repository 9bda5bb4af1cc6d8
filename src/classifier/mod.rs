//! Tile classifier capability.
//!
//! The classifier is an explicitly constructed object with a one-time
//! `initialize` step, passed into the run context. Nothing here is global.

use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::error::ScoreError;
use crate::io::{OUTPUT_DELIMITER, is_plain_field};
use crate::schema::v1::{N_STAGES, TileClass};

mod table;

pub use table::PredictionTable;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileRef {
    pub tile_id: String,
    pub slide_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePrediction {
    pub class: TileClass,
    pub uncertainty: f64,
}

impl TilePrediction {
    /// Checks that `uncertainty` is finite and within [0, 1]. Values are not clipped.
    pub fn new(tile_id: &str, class: TileClass, uncertainty: f64) -> Result<Self, ScoreError> {
        if !uncertainty.is_finite() || !(0.0..=1.0).contains(&uncertainty) {
            return Err(ScoreError::invalid_tile(
                tile_id,
                format!("uncertainty {} outside [0, 1]", uncertainty),
            ));
        }
        Ok(Self { class, uncertainty })
    }

    /// Arg-max class over the six label scores, with the normalized Shannon
    /// entropy of the score distribution as uncertainty. Ties go to the
    /// lower label index.
    pub fn from_probabilities(
        tile_id: &str,
        scores: &[f64; N_STAGES + 1],
    ) -> Result<Self, ScoreError> {
        if scores.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ScoreError::invalid_tile(
                tile_id,
                "class scores must be finite and non-negative",
            ));
        }
        let total: f64 = scores.iter().sum();
        if total <= 0.0 {
            return Err(ScoreError::invalid_tile(tile_id, "class scores sum to zero"));
        }

        let mut best = 0usize;
        for (i, &s) in scores.iter().enumerate() {
            if s > scores[best] {
                best = i;
            }
        }

        let mut entropy = 0.0f64;
        for &s in scores {
            let p = s / total;
            if p > 0.0 {
                entropy -= p * p.ln();
            }
        }
        let uncertainty = (entropy / (scores.len() as f64).ln()).clamp(0.0, 1.0);

        let class = TileClass::from_index(best).ok_or_else(|| {
            ScoreError::invalid_tile(tile_id, format!("class index {} out of range", best))
        })?;
        Ok(Self { class, uncertainty })
    }
}

pub trait TileClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Loads whatever backs the classifier. Called once per run.
    fn initialize(&mut self) -> Result<()>;

    /// Tiles available for scoring, in input order.
    fn tiles(&self) -> Result<Vec<TileRef>, ScoreError>;

    fn classify(&self, tile: &TileRef) -> Result<TilePrediction, ScoreError>;
}

/// Classifier over predictions already held in memory.
#[derive(Debug, Default)]
pub struct InMemoryClassifier {
    order: Vec<TileRef>,
    predictions: HashMap<String, Result<TilePrediction, String>>,
    initialized: bool,
}

impl InMemoryClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a `tile_id` that is already registered.
    pub fn push(&mut self, tile: TileRef, prediction: TilePrediction) -> Result<()> {
        self.insert(tile, Ok(prediction))
    }

    /// Registers a tile whose classifier output carries an unrecognized label.
    pub fn push_raw_label(&mut self, tile: TileRef, label: &str) -> Result<()> {
        self.insert(tile, Err(label.to_string()))
    }

    fn insert(&mut self, tile: TileRef, entry: Result<TilePrediction, String>) -> Result<()> {
        if self.predictions.contains_key(&tile.tile_id) {
            bail!("duplicate tile_id '{}'", tile.tile_id);
        }
        if !is_plain_field(&tile.tile_id) || !is_plain_field(&tile.slide_id) {
            bail!(
                "tile '{}': ids must not contain '{}'",
                tile.tile_id,
                OUTPUT_DELIMITER.as_char()
            );
        }
        self.predictions.insert(tile.tile_id.clone(), entry);
        self.order.push(tile);
        Ok(())
    }
}

impl TileClassifier for InMemoryClassifier {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn initialize(&mut self) -> Result<()> {
        self.initialized = true;
        Ok(())
    }

    fn tiles(&self) -> Result<Vec<TileRef>, ScoreError> {
        if !self.initialized {
            return Err(ScoreError::ClassifierNotInitialized(self.name().to_string()));
        }
        Ok(self.order.clone())
    }

    fn classify(&self, tile: &TileRef) -> Result<TilePrediction, ScoreError> {
        if !self.initialized {
            return Err(ScoreError::ClassifierNotInitialized(self.name().to_string()));
        }
        match self.predictions.get(&tile.tile_id) {
            Some(Ok(p)) => Ok(*p),
            Some(Err(label)) => Err(ScoreError::InvalidClass {
                tile_id: tile.tile_id.clone(),
                label: label.clone(),
            }),
            None => Err(ScoreError::invalid_tile(&tile.tile_id, "no prediction for tile")),
        }
    }
}
