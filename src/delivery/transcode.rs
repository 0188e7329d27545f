// Web transcode
//
// Re-encodes the detector's raw render as H.264/AAC MP4 with the moov atom up
// front so browsers can start playback before the download finishes.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::constants::{TRANSCODE_POLL_MILLIS, WEB_AUDIO_CODEC, WEB_MOVFLAGS, WEB_VIDEO_CODEC};
use crate::error::{PpeWatchError, Result};

/// Terminal state of a transcode attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TranscodeStatus {
    Succeeded,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: TranscodeStatus,
}

impl TranscodeJob {
    pub fn succeeded(&self) -> bool {
        self.status == TranscodeStatus::Succeeded
    }
}

pub struct Transcoder {
    ffmpeg: PathBuf,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(ffmpeg: PathBuf, timeout: Duration) -> Self {
        Self { ffmpeg, timeout }
    }

    /// Build ffmpeg args for a web-compatible copy of `input`.
    pub fn build_args(input: &Path, output: &Path) -> Result<Vec<String>> {
        Ok(vec![
            "-y".to_string(),
            "-i".to_string(),
            path_str(input)?,
            "-vcodec".to_string(),
            WEB_VIDEO_CODEC.to_string(),
            "-acodec".to_string(),
            WEB_AUDIO_CODEC.to_string(),
            "-movflags".to_string(),
            WEB_MOVFLAGS.to_string(),
            path_str(output)?,
        ])
    }

    /// Single transcode attempt. Never returns an error: every failure is
    /// recorded on the job so the caller can fall back to the raw render.
    pub fn run(&self, input: &Path, output: &Path) -> TranscodeJob {
        let status = match self.try_transcode(input, output) {
            Ok(()) => {
                log::info!("Transcoded {} -> {}", input.display(), output.display());
                TranscodeStatus::Succeeded
            }
            Err(e) => {
                log::warn!("Transcode of {} failed: {}", input.display(), e);
                TranscodeStatus::Failed { reason: e.to_string() }
            }
        };

        TranscodeJob {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            status,
        }
    }

    fn try_transcode(&self, input: &Path, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Temp file for atomic write; keeps the web_out_ prefix so it is never
        // mistaken for a raw render.
        let tmp_path = output.with_extension("tmp.mp4");
        let args = Self::build_args(input, &tmp_path)?;

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PpeWatchError::FFmpeg(format!("failed to launch {}: {}", self.ffmpeg.display(), e))
            })?;

        // Drain stderr on a helper thread so a chatty ffmpeg can't block on a full pipe.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                let _ = std::fs::remove_file(&tmp_path);
                return Err(PpeWatchError::FFmpeg(format!(
                    "timed out after {:?}",
                    self.timeout
                )));
            }
            thread::sleep(Duration::from_millis(TRANSCODE_POLL_MILLIS));
        };

        let stderr = stderr_reader
            .and_then(|h| h.join().ok())
            .unwrap_or_default();

        if !status.success() {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(PpeWatchError::FFmpeg(format!(
                "exited with {}: {}",
                status,
                last_line(&stderr)
            )));
        }

        std::fs::rename(&tmp_path, output)?;

        let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            let _ = std::fs::remove_file(output);
            return Err(PpeWatchError::FFmpeg("transcoded file is empty".to_string()));
        }

        Ok(())
    }
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| PpeWatchError::InvalidPath(path.display().to_string()))
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = Transcoder::build_args(Path::new("raw/in.avi"), Path::new("out/web.mp4")).unwrap();
        assert_eq!(
            args,
            vec![
                "-y", "-i", "raw/in.avi", "-vcodec", "libx264", "-acodec", "aac",
                "-movflags", "faststart", "out/web.mp4",
            ]
        );
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\nb\n\n"), "b");
        assert_eq!(last_line(""), "no output");
    }

    #[test]
    fn test_missing_binary_fails_job() {
        let temp = tempfile::TempDir::new().unwrap();
        let transcoder = Transcoder::new(temp.path().join("no-ffmpeg"), Duration::from_secs(5));
        let job = transcoder.run(&temp.path().join("in.avi"), &temp.path().join("web_out_1.mp4"));

        assert!(!job.succeeded());
        assert!(matches!(job.status, TranscodeStatus::Failed { .. }));
        assert!(!temp.path().join("web_out_1.mp4").exists());
    }

    #[test]
    fn test_status_serialization() {
        let failed = TranscodeStatus::Failed { reason: "boom".to_string() };
        let json = serde_json::to_string(&failed).unwrap();
        assert_eq!(json, r#"{"status":"failed","reason":"boom"}"#);
        let ok = serde_json::to_string(&TranscodeStatus::Succeeded).unwrap();
        assert_eq!(ok, r#"{"status":"succeeded"}"#);
    }
}
