// Pipeline orchestrator
//
// One uploaded video in, one result out:
// store upload -> detect -> read/aggregate/score -> resolve playable video.
// Detection and scoring failures fail the whole run; a failed transcode only
// changes which video gets linked.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::delivery::{MediaResolver, Transcoder};
use crate::detect::{Detector, PredictRequest};
use crate::error::{PpeWatchError, Result};
use crate::scoring::{score_stream, SafetyScore};
use crate::workspace::{new_run_id, Workspace};

/// A video submitted for analysis.
#[derive(Debug, Clone)]
pub struct Upload {
    pub source: PathBuf,
    /// Name the client gave the file.
    pub filename: String,
}

impl Upload {
    pub fn from_path(path: &Path) -> Result<Self> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PpeWatchError::InvalidPath(path.display().to_string()))?
            .to_string();
        Ok(Self {
            source: path.to_path_buf(),
            filename,
        })
    }
}

/// What the web layer renders for a processed video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    #[serde(flatten)]
    pub stats: SafetyScore,
    pub input_video: Option<String>,
    pub output_video: Option<String>,
}

pub struct Pipeline {
    detector: Arc<dyn Detector>,
    workspace: Workspace,
    resolver: MediaResolver,
    confidence: f32,
    iou: f32,
}

impl Pipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        workspace: Workspace,
        resolver: MediaResolver,
        confidence: f32,
        iou: f32,
    ) -> Self {
        Self {
            detector,
            workspace,
            resolver,
            confidence,
            iou,
        }
    }

    /// Build a pipeline from config, with ffmpeg resolved from the tool search path.
    pub fn from_config(config: &PipelineConfig, detector: Arc<dyn Detector>) -> Result<Self> {
        config.validate()?;
        let transcoder = Transcoder::new(
            crate::tools::ffmpeg_path(),
            Duration::from_secs(config.transcode_timeout_secs),
        );
        Ok(Self::new(
            detector,
            Workspace::new(&config.workspace, config.static_prefix.clone()),
            MediaResolver::new(transcoder),
            config.confidence,
            config.iou,
        ))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Process one upload. `None` in, `None` out, with nothing touched.
    pub fn run(&self, upload: Option<&Upload>) -> Result<Option<PipelineResult>> {
        let Some(upload) = upload else {
            return Ok(None);
        };
        self.run_with_id(upload, &new_run_id()).map(Some)
    }

    pub fn run_with_id(&self, upload: &Upload, run_id: &str) -> Result<PipelineResult> {
        let run = self.workspace.plan_run(run_id, &upload.filename);
        self.workspace.store_upload(&run, &upload.source)?;

        log::info!("Run {}: detecting on {}", run.run_id, run.upload_path.display());
        let request = PredictRequest {
            source: run.upload_path.clone(),
            project: run.output_root.clone(),
            name: run.result_name.clone(),
            confidence: self.confidence,
            iou: self.iou,
        };
        let frames = self.detector.predict(&request)?;

        // Draining the stream also lets the detector finish rendering.
        let stats = score_stream(frames, self.detector.labels())?;
        log::info!(
            "Run {}: {} persons, safety score {}",
            run.run_id,
            stats.total_persons,
            stats.safety_score
        );

        let delivery = self.resolver.resolve(&self.workspace, &run)?;

        Ok(PipelineResult {
            stats,
            input_video: delivery.input_video,
            output_video: delivery.output_video,
        })
    }
}
