// Detector sidecar process
//
// Runs the detector binary once per video. The process renders the annotated
// video into the run directory and streams per-frame detections as JSON lines
// on stdout. Frames are handed out as they arrive; the exit status is checked
// once stdout is exhausted.

use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use super::{Detector, FrameStream, JsonLinesFrames, LabelTable, PredictRequest, RawFrame};
use crate::error::{PpeWatchError, Result};

pub struct SidecarDetector {
    program: PathBuf,
    model: PathBuf,
    labels: LabelTable,
}

impl SidecarDetector {
    /// Load the detector once. The label table is read up front so every run
    /// resolves class ids against the same table.
    pub fn load(program: PathBuf, model: &Path, labels_path: &Path) -> Result<Self> {
        if !model.exists() {
            return Err(PpeWatchError::FileNotFound(model.display().to_string()));
        }
        let labels = LabelTable::load(labels_path)?;
        log::info!(
            "Loaded detector model {} ({} classes)",
            model.display(),
            labels.len()
        );
        Ok(Self::with_labels(program, model.to_path_buf(), labels))
    }

    pub fn with_labels(program: PathBuf, model: PathBuf, labels: LabelTable) -> Self {
        Self { program, model, labels }
    }

    pub fn build_args(&self, request: &PredictRequest) -> Vec<String> {
        vec![
            "--model".to_string(),
            self.model.to_string_lossy().to_string(),
            "--source".to_string(),
            request.source.to_string_lossy().to_string(),
            "--project".to_string(),
            request.project.to_string_lossy().to_string(),
            "--name".to_string(),
            request.name.clone(),
            "--conf".to_string(),
            request.confidence.to_string(),
            "--iou".to_string(),
            request.iou.to_string(),
            "--save".to_string(),
            "--exist-ok".to_string(),
        ]
    }
}

impl Detector for SidecarDetector {
    fn labels(&self) -> &LabelTable {
        &self.labels
    }

    fn predict(&self, request: &PredictRequest) -> Result<FrameStream> {
        std::fs::create_dir_all(request.run_dir())?;

        let args = self.build_args(request);
        log::debug!("Spawning detector: {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                PpeWatchError::Detection(format!(
                    "failed to launch detector {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PpeWatchError::Detection("detector stdout unavailable".to_string()))?;

        Ok(Box::new(SidecarFrames {
            frames: JsonLinesFrames::new(BufReader::new(stdout), self.labels.clone()),
            child: Some(child),
        }))
    }
}

/// Frame stream tied to a running detector process.
struct SidecarFrames {
    frames: JsonLinesFrames<BufReader<ChildStdout>>,
    child: Option<Child>,
}

impl SidecarFrames {
    fn finish(&mut self) -> Option<Result<RawFrame>> {
        let mut child = self.child.take()?;
        match child.wait() {
            Ok(status) if status.success() => None,
            Ok(status) => Some(Err(PpeWatchError::Detection(format!(
                "detector exited with {}",
                status
            )))),
            Err(e) => Some(Err(PpeWatchError::Detection(format!(
                "failed to wait for detector: {}",
                e
            )))),
        }
    }
}

impl Iterator for SidecarFrames {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;

        match self.frames.next() {
            Some(Ok(frame)) => Some(Ok(frame)),
            Some(Err(e)) => {
                // Stream is corrupt; stop the detector rather than wait on it.
                if let Some(mut child) = self.child.take() {
                    let _ = child.kill();
                    let _ = child.wait();
                }
                Some(Err(e))
            }
            None => self.finish(),
        }
    }
}

impl Drop for SidecarFrames {
    fn drop(&mut self) {
        // Abandoned mid-stream: the caller gave up on this run.
        if let Some(mut child) = self.child.take() {
            log::debug!("Stopping abandoned detector process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
