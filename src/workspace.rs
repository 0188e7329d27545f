// Run workspace layout
//
// <root>/uploads/<run_id>_<filename>        stored upload
// <root>/output/result_<run_id>/            detector run directory
// <root>/output/result_<run_id>/web_out_<run_id>.mp4   transcoded artifact
//
// Video references handed to callers are URL-style locators under the static
// prefix, e.g. /static/output/result_17/web_out_17.mp4

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::{
    OUTPUT_FOLDER, RESULT_DIR_PREFIX, UPLOADS_FOLDER, WEB_CONTAINER_EXT, WEB_OUT_PREFIX,
};
use crate::error::{PpeWatchError, Result};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    static_prefix: String,
}

/// Paths belonging to one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub run_id: String,
    pub upload_path: PathBuf,
    /// Parent of every run directory (detector "project").
    pub output_root: PathBuf,
    /// Run directory name under `output_root`.
    pub result_name: String,
    pub web_output_path: PathBuf,
}

impl RunPaths {
    pub fn result_dir(&self) -> PathBuf {
        self.output_root.join(&self.result_name)
    }
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, static_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            static_prefix: static_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_FOLDER)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_FOLDER)
    }

    /// Create the uploads and output folders.
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.uploads_dir())?;
        fs::create_dir_all(self.output_dir())?;
        Ok(())
    }

    /// Lay out paths for a new run. Nothing is created on disk.
    pub fn plan_run(&self, run_id: &str, original_name: &str) -> RunPaths {
        let result_name = format!("{}{}", RESULT_DIR_PREFIX, run_id);
        let output_root = self.output_dir();
        let web_output_path = output_root
            .join(&result_name)
            .join(format!("{}{}.{}", WEB_OUT_PREFIX, run_id, WEB_CONTAINER_EXT));

        RunPaths {
            run_id: run_id.to_string(),
            upload_path: self
                .uploads_dir()
                .join(format!("{}_{}", run_id, sanitize_filename(original_name))),
            output_root,
            result_name,
            web_output_path,
        }
    }

    /// Copy an uploaded video into the uploads folder and create the run directory.
    pub fn store_upload(&self, run: &RunPaths, source: &Path) -> Result<()> {
        if !source.is_file() {
            return Err(PpeWatchError::FileNotFound(source.display().to_string()));
        }
        self.init()?;
        fs::copy(source, &run.upload_path)?;
        fs::create_dir_all(run.result_dir())?;
        log::info!("Stored upload {} as {}", source.display(), run.upload_path.display());
        Ok(())
    }

    /// Locator for a file inside the workspace.
    pub fn locator(&self, path: &Path) -> Result<String> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            PpeWatchError::InvalidPath(format!(
                "{} is outside workspace {}",
                path.display(),
                self.root.display()
            ))
        })?;

        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("/");

        Ok(format!("{}/{}", self.static_prefix.trim_end_matches('/'), relative))
    }
}

/// Run ids are UNIX timestamps in seconds.
pub fn new_run_id() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("valid filename regex"))
}

/// Reduce an uploaded filename to a single safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = unsafe_chars().replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_run_layout() {
        let ws = Workspace::new("/srv/static", "/static");
        let run = ws.plan_run("1700000000", "site cam.mp4");

        assert_eq!(run.upload_path, PathBuf::from("/srv/static/uploads/1700000000_site_cam.mp4"));
        assert_eq!(run.result_dir(), PathBuf::from("/srv/static/output/result_1700000000"));
        assert_eq!(
            run.web_output_path,
            PathBuf::from("/srv/static/output/result_1700000000/web_out_1700000000.mp4")
        );
    }

    #[test]
    fn test_locator() {
        let ws = Workspace::new("/srv/static", "/static/");
        let loc = ws
            .locator(Path::new("/srv/static/output/result_1/web_out_1.mp4"))
            .unwrap();
        assert_eq!(loc, "/static/output/result_1/web_out_1.mp4");

        assert!(ws.locator(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\videos\\gate 3.avi"), "gate_3.avi");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("ñandú.mp4"), "_and_.mp4");
    }

    #[test]
    fn test_store_upload() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("in.mp4");
        fs::write(&source, b"video").unwrap();

        let ws = Workspace::new(temp.path().join("static"), "/static");
        let run = ws.plan_run("42", "in.mp4");
        ws.store_upload(&run, &source).unwrap();

        assert_eq!(fs::read(&run.upload_path).unwrap(), b"video");
        assert!(run.result_dir().is_dir());
    }

    #[test]
    fn test_store_upload_missing_source() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path(), "/static");
        let run = ws.plan_run("42", "in.mp4");
        assert!(matches!(
            ws.store_upload(&run, &temp.path().join("nope.mp4")),
            Err(PpeWatchError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_run_id_is_numeric() {
        assert!(new_run_id().parse::<i64>().unwrap() > 0);
    }
}
