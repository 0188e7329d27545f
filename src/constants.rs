// PPE Watch Constants
// Detector label strings must match the label table shipped with the model.

// ----- Violation taxonomy -----
// Detector labels tracked by the safety scorer. "none" is the model's name for a missing vest.
pub const LABEL_PERSON: &str = "Person";
pub const LABEL_NO_HELMET: &str = "no_helmet";
pub const LABEL_NO_VEST: &str = "none";
pub const LABEL_NO_GLOVES: &str = "no_gloves";

// Safety attributes checked per person (helmet, vest, gloves)
pub const SAFETY_ATTRIBUTES_PER_PERSON: u32 = 3;

// Score bounds
pub const SCORE_MIN: u32 = 0;
pub const SCORE_MAX: u32 = 100;

// Report keys for the violation breakdown
pub const REPORT_NO_HELMET: &str = "No Helmet";
pub const REPORT_NO_VEST: &str = "No Vest";
pub const REPORT_NO_GLOVES: &str = "No Gloves";

// ----- Detector defaults -----
pub const DEFAULT_CONFIDENCE: f32 = 0.4;
pub const DEFAULT_IOU: f32 = 0.5;
pub const DEFAULT_MODEL_PATH: &str = "model/best.pt";

// ----- Workspace layout -----
pub const UPLOADS_FOLDER: &str = "uploads";
pub const OUTPUT_FOLDER: &str = "output";
pub const RESULT_DIR_PREFIX: &str = "result_";
pub const WEB_OUT_PREFIX: &str = "web_out_";
pub const DEFAULT_STATIC_PREFIX: &str = "/static";
pub const DEFAULT_WORKSPACE: &str = "static";
pub const CONFIG_FILENAME: &str = "config.json";

// Raw artifact containers the detector may render
pub const RAW_VIDEO_EXTENSIONS: [&str; 2] = ["avi", "mp4"];

// ----- Transcoding -----
pub const WEB_VIDEO_CODEC: &str = "libx264";
pub const WEB_AUDIO_CODEC: &str = "aac";
pub const WEB_MOVFLAGS: &str = "faststart";
pub const WEB_CONTAINER_EXT: &str = "mp4";
pub const TRANSCODE_TIMEOUT_SECS: u64 = 600;   // 10 minutes max per video
pub const TRANSCODE_POLL_MILLIS: u64 = 100;

// ----- Tool overrides -----
pub const ENV_FFMPEG_PATH: &str = "PPEWATCH_FFMPEG_PATH";
pub const ENV_DETECTOR_PATH: &str = "PPEWATCH_DETECTOR_PATH";
pub const DEFAULT_DETECTOR_BIN: &str = "ppe-detect";
