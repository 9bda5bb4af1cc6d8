pub mod classifier;
pub mod cli;
pub mod config;
pub mod ctx;
pub mod error;
pub mod io;
pub mod math;
pub mod pipeline;
pub mod schema;
pub mod scores;
pub mod thresholds;
