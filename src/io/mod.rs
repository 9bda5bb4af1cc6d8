use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

pub mod json_writer;
pub mod summary;
pub mod tables;

pub const NA: &str = "NA";

/// Separator of every table this crate writes.
pub const OUTPUT_DELIMITER: Delimiter = Delimiter::Semicolon;

/// True when `value` can be written as one field of an output table.
pub fn is_plain_field(value: &str) -> bool {
    !value.contains([OUTPUT_DELIMITER.as_char(), '\n', '\r'])
}

/// Field separator for delimited tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    #[default]
    Semicolon,
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_char(self) -> char {
        match self {
            Delimiter::Semicolon => ';',
            Delimiter::Tab => '\t',
            Delimiter::Comma => ',',
        }
    }
}

/// Two-decimal rendering used by every text table.
pub fn format_f2(value: f64) -> String {
    format!("{:.2}", value)
}

pub fn format_opt_f2(value: Option<f64>) -> String {
    value.map(format_f2).unwrap_or_else(|| NA.to_string())
}

pub(crate) fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let decoder = GzDecoder::new(file);
        Ok(Box::new(decoder))
    } else {
        Ok(Box::new(file))
    }
}
