// PPE Watch - Library Entry Point
//
// Turns a detector run over a site video into a safety score and a
// browser-playable annotated video.

pub mod config;
pub mod constants;
pub mod delivery;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod scoring;
pub mod tools;
pub mod workspace;

pub use error::{PpeWatchError, Result};
pub use pipeline::{Pipeline, PipelineResult, Upload};
