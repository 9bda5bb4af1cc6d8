use thiserror::Error;

/// Domain faults raised by the scoring engine.
///
/// Threshold configuration errors abort a run before any slide is scored;
/// tile-level faults are either fatal or excluded depending on the
/// configured [`crate::config::InvalidTilePolicy`].
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("threshold config {source_name}: {message}")]
    ThresholdConfig {
        source_name: String,
        message: String,
    },

    #[error("tile {tile_id}: unrecognized class label '{label}'")]
    InvalidClass { tile_id: String, label: String },

    #[error("tile {tile_id}: {message}")]
    InvalidTile { tile_id: String, message: String },

    #[error("classifier '{0}' used before initialize()")]
    ClassifierNotInitialized(String),

    #[error("run cancelled after {scored} of {total} slides")]
    Cancelled { scored: usize, total: usize },
}

impl ScoreError {
    pub fn threshold(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ThresholdConfig {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_tile(tile_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTile {
            tile_id: tile_id.into(),
            message: message.into(),
        }
    }

    /// True for per-tile data faults that the exclude policy may skip.
    pub fn is_tile_fault(&self) -> bool {
        matches!(self, Self::InvalidClass { .. } | Self::InvalidTile { .. })
    }
}
