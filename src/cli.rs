// PPE Watch CLI binary

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use ppe_watch_lib::config::PipelineConfig;
use ppe_watch_lib::detect::replay::ReplayDetector;
use ppe_watch_lib::detect::sidecar::SidecarDetector;
use ppe_watch_lib::detect::{Detector, JsonLinesFrames, LabelTable};
use ppe_watch_lib::scoring::{score_stream, SafetyScore};
use ppe_watch_lib::tools::{self, Tool};
use ppe_watch_lib::workspace::Workspace;
use ppe_watch_lib::{Pipeline, PipelineResult, Upload};

#[derive(Parser)]
#[command(name = "ppewatch")]
#[command(about = "PPE Watch - safety scoring for site videos", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (JSON). Defaults to the per-user config if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the uploads/ and output/ folders
    Init {
        /// Workspace root (overrides config)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Run detection, scoring and web transcode for one video
    Analyze {
        /// Video to analyze
        video: PathBuf,
        /// Workspace root (overrides config)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
        /// Model weights (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Class-id -> label JSON (overrides config)
        #[arg(long)]
        labels: Option<PathBuf>,
        /// Replay a recorded JSON-lines detection log instead of running the detector
        #[arg(long)]
        replay: Option<PathBuf>,
        /// Pre-rendered annotated video to use with --replay
        #[arg(long, requires = "replay")]
        rendered: Option<PathBuf>,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a recorded JSON-lines detection log
    Score {
        /// Detection log
        detections: PathBuf,
        /// Class-id -> label JSON
        #[arg(short, long)]
        labels: PathBuf,
        /// Print the score as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and the detector can be launched
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { workspace } => cmd_init(config, workspace),
        Commands::Analyze { video, workspace, model, labels, replay, rendered, json } => {
            cmd_analyze(config, video, workspace, model, labels, replay, rendered, json)
        }
        Commands::Score { detections, labels, json } => cmd_score(detections, labels, json),
        Commands::Doctor => cmd_doctor(),
    }
}

fn cmd_init(config: PipelineConfig, workspace: Option<PathBuf>) -> Result<()> {
    let root = workspace.unwrap_or(config.workspace);
    let ws = Workspace::new(&root, config.static_prefix);
    ws.init()?;

    println!("Initialized workspace at {}", root.display());
    println!("  uploads/   - Stored uploads");
    println!("  output/    - Detector runs and web videos");

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_analyze(
    mut config: PipelineConfig,
    video: PathBuf,
    workspace: Option<PathBuf>,
    model: Option<PathBuf>,
    labels: Option<PathBuf>,
    replay: Option<PathBuf>,
    rendered: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if let Some(ws) = workspace {
        config.workspace = ws;
    }
    if let Some(m) = model {
        config.model_path = m;
    }
    if let Some(l) = labels {
        config.labels_path = Some(l);
    }

    let labels_path = config.resolved_labels_path();
    let detector: Arc<dyn Detector> = match replay {
        Some(log_path) => {
            let table = LabelTable::load(&labels_path)?;
            let mut det = ReplayDetector::new(log_path, table);
            if let Some(video) = rendered {
                det = det.with_rendered_video(video);
            }
            Arc::new(det)
        }
        None => Arc::new(SidecarDetector::load(
            tools::detector_path(),
            &config.model_path,
            &labels_path,
        )?),
    };

    let pipeline = Pipeline::from_config(&config, detector)?;
    let upload = Upload::from_path(&video)?;

    let result = pipeline
        .run(Some(&upload))?
        .ok_or_else(|| anyhow::anyhow!("No result for {}", video.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(())
}

fn cmd_score(detections: PathBuf, labels: PathBuf, json: bool) -> Result<()> {
    let table = LabelTable::load(&labels)?;
    let file = File::open(&detections)
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", detections.display(), e))?;

    let frames = JsonLinesFrames::new(BufReader::new(file), table.clone());
    let stats = score_stream(frames, &table)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }

    Ok(())
}

fn cmd_doctor() -> Result<()> {
    let mut missing = 0;

    for tool in [Tool::Ffmpeg, Tool::Detector] {
        let path = tools::tool_path(tool);
        let ok = tools::is_tool_available(tool);
        if !ok {
            missing += 1;
        }
        println!(
            "{:>12}  {:>8}  {}",
            tool.name(),
            if ok { "ok" } else { "missing" },
            path.display()
        );
    }

    if missing > 0 {
        println!();
        println!("Without ffmpeg, videos are served untranscoded.");
        println!("Without the detector, only 'analyze --replay' and 'score' work.");
    }

    Ok(())
}

// --- Helper Functions ---

fn print_stats(stats: &SafetyScore) {
    println!("Safety score:   {}/100", stats.safety_score);
    println!("Persons:        {}", stats.total_persons);
    println!();
    println!("{:>12}  {:>5}", "Violation", "Count");
    println!("{}", "-".repeat(19));
    for (name, count) in stats.violations.entries() {
        println!("{:>12}  {:>5}", name, count);
    }
}

fn print_result(result: &PipelineResult) {
    print_stats(&result.stats);
    println!();
    println!("Input video:    {}", result.input_video.as_deref().unwrap_or("-"));
    println!("Output video:   {}", result.output_video.as_deref().unwrap_or("-"));
}
