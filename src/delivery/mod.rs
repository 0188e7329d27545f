// Media delivery
//
// Picks the detector's raw render out of a run directory and exposes a
// browser-playable reference to it:
// - transcode succeeded: input video + transcoded output are exposed
// - transcode failed:    the raw render is exposed as output, input is not
// - nothing rendered:    no references at all, nothing spawned

pub mod transcode;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::constants::{RAW_VIDEO_EXTENSIONS, WEB_OUT_PREFIX};
use crate::error::Result;
use crate::workspace::{RunPaths, Workspace};

pub use transcode::{TranscodeJob, TranscodeStatus, Transcoder};

/// Video references resolved for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub input_video: Option<String>,
    pub output_video: Option<String>,
    /// The transcode attempt, when there was a raw render to transcode.
    pub job: Option<TranscodeJob>,
}

/// Check if a file is a raw render the detector could have produced.
pub fn is_raw_artifact(path: &Path) -> bool {
    let is_ours = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(WEB_OUT_PREFIX))
        .unwrap_or(false);
    if is_ours {
        return false;
    }

    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e.to_lowercase(),
        None => return false,
    };

    RAW_VIDEO_EXTENSIONS.contains(&ext.as_str())
}

/// First raw render in `dir` by file name, if any. A missing directory
/// means the detector rendered nothing.
pub fn select_raw_artifact(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if entry.file_type().is_file() && is_raw_artifact(path) {
            return Ok(Some(path.to_path_buf()));
        }
    }

    Ok(None)
}

pub struct MediaResolver {
    transcoder: Transcoder,
}

impl MediaResolver {
    pub fn new(transcoder: Transcoder) -> Self {
        Self { transcoder }
    }

    /// Resolve the playable video for a finished detector run.
    pub fn resolve(&self, workspace: &Workspace, run: &RunPaths) -> Result<Delivery> {
        let raw = match select_raw_artifact(&run.result_dir()) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::info!("Run {}: detector produced no video", run.run_id);
                return Ok(Delivery::default());
            }
            Err(e) => {
                // Scoring already succeeded; an unreadable run dir only costs the video.
                log::warn!("Run {}: cannot list {}: {}", run.run_id, run.result_dir().display(), e);
                return Ok(Delivery::default());
            }
        };

        let job = self.transcoder.run(&raw, &run.web_output_path);

        let delivery = if job.succeeded() {
            Delivery {
                input_video: Some(workspace.locator(&run.upload_path)?),
                output_video: Some(workspace.locator(&job.output)?),
                job: Some(job),
            }
        } else {
            // Fallback serves the raw render as-is. The input preview is only
            // exposed on success.
            log::warn!("Run {}: serving untranscoded {}", run.run_id, raw.display());
            Delivery {
                input_video: None,
                output_video: Some(workspace.locator(&raw)?),
                job: Some(job),
            }
        };

        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn stub_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("ffmpeg-stub");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn setup(raw_files: &[&str]) -> (TempDir, Workspace, RunPaths) {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path().join("static"), "/static");
        let run = ws.plan_run("17", "site.mp4");
        fs::create_dir_all(run.result_dir()).unwrap();
        fs::create_dir_all(ws.uploads_dir()).unwrap();
        fs::write(&run.upload_path, b"upload").unwrap();
        for name in raw_files {
            fs::write(run.result_dir().join(name), b"raw").unwrap();
        }
        (temp, ws, run)
    }

    #[test]
    fn test_is_raw_artifact() {
        assert!(is_raw_artifact(Path::new("out/site.avi")));
        assert!(is_raw_artifact(Path::new("out/site.MP4")));
        assert!(!is_raw_artifact(Path::new("out/site.mkv")));
        assert!(!is_raw_artifact(Path::new("out/labels.txt")));
        assert!(!is_raw_artifact(Path::new("out/web_out_17.mp4")));
        assert!(!is_raw_artifact(Path::new("out/web_out_17.tmp.mp4")));
    }

    #[test]
    fn test_select_first_by_name() {
        let (_temp, _ws, run) = setup(&["b.mp4", "notes.txt", "a.avi", "c.avi"]);
        let raw = select_raw_artifact(&run.result_dir()).unwrap().unwrap();
        assert_eq!(raw.file_name().unwrap(), "a.avi");
    }

    #[test]
    fn test_select_missing_dir() {
        let temp = TempDir::new().unwrap();
        assert_eq!(select_raw_artifact(&temp.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn test_no_artifact_no_refs() {
        let (temp, ws, run) = setup(&["notes.txt"]);
        // A transcoder that could never run proves nothing was spawned.
        let resolver = MediaResolver::new(Transcoder::new(temp.path().join("missing"), Duration::from_secs(1)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery, Delivery::default());
    }

    #[test]
    fn test_fallback_when_ffmpeg_missing() {
        let (temp, ws, run) = setup(&["site.avi", "zz.mp4"]);
        let resolver = MediaResolver::new(Transcoder::new(temp.path().join("missing"), Duration::from_secs(1)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery.input_video, None);
        assert_eq!(delivery.output_video.as_deref(), Some("/static/output/result_17/site.avi"));
        assert!(!delivery.job.unwrap().succeeded());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_run_dir_has_no_refs() {
        use std::os::unix::fs::PermissionsExt;

        let (temp, ws, run) = setup(&["site.avi"]);
        fs::set_permissions(run.result_dir(), fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(run.result_dir()).is_ok() {
            // Permission bits don't bind root; nothing to exercise.
            fs::set_permissions(run.result_dir(), fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        assert!(select_raw_artifact(&run.result_dir()).is_err());
        let resolver = MediaResolver::new(Transcoder::new(temp.path().join("missing"), Duration::from_secs(1)));
        let delivery = resolver.resolve(&ws, &run);
        fs::set_permissions(run.result_dir(), fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(delivery.unwrap(), Delivery::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_success_exposes_both() {
        let (temp, ws, run) = setup(&["site.avi"]);
        let ffmpeg = stub_ffmpeg(temp.path(), "for last; do :; done\necho web > \"$last\"");
        let resolver = MediaResolver::new(Transcoder::new(ffmpeg, Duration::from_secs(10)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery.input_video.as_deref(), Some("/static/uploads/17_site.mp4"));
        assert_eq!(delivery.output_video.as_deref(), Some("/static/output/result_17/web_out_17.mp4"));
        assert!(delivery.job.unwrap().succeeded());
        assert!(run.web_output_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_falls_back() {
        let (temp, ws, run) = setup(&["site.avi"]);
        let ffmpeg = stub_ffmpeg(temp.path(), "echo 'Unknown encoder libx264' >&2\nexit 1");
        let resolver = MediaResolver::new(Transcoder::new(ffmpeg, Duration::from_secs(10)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery.input_video, None);
        assert_eq!(delivery.output_video.as_deref(), Some("/static/output/result_17/site.avi"));
        match delivery.job.unwrap().status {
            TranscodeStatus::Failed { reason } => assert!(reason.contains("Unknown encoder")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!run.web_output_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_output_falls_back() {
        let (temp, ws, run) = setup(&["site.avi"]);
        let ffmpeg = stub_ffmpeg(temp.path(), "for last; do :; done\n: > \"$last\"");
        let resolver = MediaResolver::new(Transcoder::new(ffmpeg, Duration::from_secs(10)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery.input_video, None);
        assert_eq!(delivery.output_video.as_deref(), Some("/static/output/result_17/site.avi"));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_falls_back() {
        let (temp, ws, run) = setup(&["site.avi"]);
        let ffmpeg = stub_ffmpeg(temp.path(), "exec sleep 30");
        let resolver = MediaResolver::new(Transcoder::new(ffmpeg, Duration::from_millis(300)));

        let delivery = resolver.resolve(&ws, &run).unwrap();
        assert_eq!(delivery.input_video, None);
        match delivery.job.unwrap().status {
            TranscodeStatus::Failed { reason } => assert!(reason.contains("timed out after 300ms")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
