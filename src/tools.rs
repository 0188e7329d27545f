// External tool resolver for ffmpeg and the detector sidecar
//
// Resolution order:
// 1) Environment variable override (PPEWATCH_FFMPEG_PATH, PPEWATCH_DETECTOR_PATH)
// 2) Sidecar next to the executable
// 3) bin/ subdirectory next to the executable
// 4) PATH fallback

use std::env;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::constants::{DEFAULT_DETECTOR_BIN, ENV_DETECTOR_PATH, ENV_FFMPEG_PATH};

/// External tools the pipeline shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Ffmpeg,
    Detector,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "ffmpeg",
            Tool::Detector => DEFAULT_DETECTOR_BIN,
        }
    }

    fn env_key(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => ENV_FFMPEG_PATH,
            Tool::Detector => ENV_DETECTOR_PATH,
        }
    }

    /// Argument that makes the tool print its version and exit 0.
    fn probe_arg(&self) -> &'static str {
        match self {
            Tool::Ffmpeg => "-version",
            Tool::Detector => "--version",
        }
    }
}

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a tool path.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
        log::warn!("{} points to missing file {}, ignoring", env_key, v);
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }

        let bin_candidate = dir.join("bin").join(&filename);
        if bin_candidate.exists() {
            return bin_candidate;
        }
    }

    PathBuf::from(default_name)
}

/// Resolve the path for a tool.
pub fn tool_path(tool: Tool) -> PathBuf {
    resolve_tool(tool.env_key(), tool.name())
}

/// Get path to ffmpeg binary
pub fn ffmpeg_path() -> PathBuf {
    tool_path(Tool::Ffmpeg)
}

/// Get path to the detector sidecar binary
pub fn detector_path() -> PathBuf {
    tool_path(Tool::Detector)
}

/// Check if a tool can actually be launched.
pub fn is_tool_available(tool: Tool) -> bool {
    Command::new(tool_path(tool))
        .arg(tool.probe_arg())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tool_fallback() {
        let path = resolve_tool("PPEWATCH_TEST_NONEXISTENT", "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }

    #[test]
    fn test_env_override() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let temp_file = temp_dir.path().join("ppewatch_test_tool");
        std::fs::write(&temp_file, "test").unwrap();

        std::env::set_var("PPEWATCH_TEST_TOOL", temp_file.to_str().unwrap());
        let path = resolve_tool("PPEWATCH_TEST_TOOL", "default");
        assert_eq!(path, temp_file);

        std::env::remove_var("PPEWATCH_TEST_TOOL");
    }

    #[test]
    fn test_env_override_missing_file_falls_back() {
        std::env::set_var("PPEWATCH_TEST_MISSING_TOOL", "/definitely/not/here/tool");
        let path = resolve_tool("PPEWATCH_TEST_MISSING_TOOL", "fallbackcmd");
        assert_eq!(path, PathBuf::from("fallbackcmd"));
        std::env::remove_var("PPEWATCH_TEST_MISSING_TOOL");
    }

    #[test]
    fn test_tool_names() {
        assert_eq!(Tool::Ffmpeg.name(), "ffmpeg");
        assert_eq!(Tool::Detector.name(), "ppe-detect");
    }
}
