// Replay detector
// Re-scores a recorded JSON-lines detection log instead of running the model.
// An already rendered video can be dropped into the run directory so delivery
// behaves as it would after a live detector run.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use super::{Detector, FrameStream, JsonLinesFrames, LabelTable, PredictRequest};
use crate::error::{PpeWatchError, Result};

pub struct ReplayDetector {
    log_path: PathBuf,
    labels: LabelTable,
    rendered_video: Option<PathBuf>,
}

impl ReplayDetector {
    pub fn new(log_path: PathBuf, labels: LabelTable) -> Self {
        Self {
            log_path,
            labels,
            rendered_video: None,
        }
    }

    pub fn with_rendered_video(mut self, video: PathBuf) -> Self {
        self.rendered_video = Some(video);
        self
    }
}

impl Detector for ReplayDetector {
    fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn predict(&self, request: &PredictRequest) -> Result<FrameStream> {
        let file = File::open(&self.log_path).map_err(|e| {
            PpeWatchError::Detection(format!(
                "cannot open detection log {}: {}",
                self.log_path.display(),
                e
            ))
        })?;

        if let Some(ref video) = self.rendered_video {
            let run_dir = request.run_dir();
            fs::create_dir_all(&run_dir)?;
            let file_name = video
                .file_name()
                .ok_or_else(|| PpeWatchError::InvalidPath(video.display().to_string()))?;
            fs::copy(video, run_dir.join(file_name))?;
            log::debug!("Replaying rendered video {}", video.display());
        }

        log::info!("Replaying detections from {}", self.log_path.display());
        Ok(Box::new(JsonLinesFrames::new(
            BufReader::new(file),
            self.labels.clone(),
        )))
    }
}
