use std::{
    fs::File,
    io::{BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use animata::Orchestrator;
use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "animata", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check a project JSON and print every validation issue.
    Validate(ValidateArgs),
    /// Compose a single frame and print the result as JSON.
    Compose(ComposeArgs),
    /// Run a render job, writing a JSON-lines frame manifest.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ValidateArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ComposeArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output manifest path (one JSON record per line).
    #[arg(long)]
    out: PathBuf,

    /// Stride-sampled preview render instead of a full one.
    #[arg(long)]
    preview: bool,

    /// Output container format.
    #[arg(long, value_enum, default_value_t = animata::OutputFormat::Mp4)]
    format: animata::OutputFormat,

    /// Target resolution.
    #[arg(long, value_enum, default_value_t = animata::Resolution::R1080p)]
    resolution: animata::Resolution,

    /// Encoding quality tier.
    #[arg(long, value_enum, default_value_t = animata::QualityTier::Standard)]
    quality: animata::QualityTier,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Validate(args) => cmd_validate(args),
        Command::Compose(args) => cmd_compose(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn read_project_json(path: &Path) -> anyhow::Result<animata::Project> {
    let f = File::open(path).with_context(|| format!("open project '{}'", path.display()))?;
    let r = BufReader::new(f);
    let project: animata::Project =
        serde_json::from_reader(r).with_context(|| "parse project JSON")?;
    Ok(project)
}

fn cmd_validate(args: ValidateArgs) -> anyhow::Result<()> {
    let mut project = read_project_json(&args.in_path)?;
    project.reconcile();
    let issues = project.validate_all();
    if issues.is_empty() {
        eprintln!("ok: {} scenes, {} frames", project.scenes.len(), project.duration);
        return Ok(());
    }
    for issue in &issues {
        eprintln!("{}: {}", issue.location, issue.message);
    }
    anyhow::bail!("{} validation issue(s)", issues.len());
}

fn cmd_compose(args: ComposeArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    let mut engine = animata::Engine::load(project)?;
    let composition = engine.compose_frame(animata::FrameIndex(args.frame))?;
    let json = serde_json::to_string_pretty(&composition)
        .with_context(|| "serialize composition")?;
    println!("{json}");
    Ok(())
}

/// Writes one JSON record per rendered frame, then a final `encode` record.
/// The manifest path doubles as the job's output URL.
struct ManifestSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ManifestSink {
    fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir '{}'", parent.display()))?;
        }
        let f = File::create(path)
            .with_context(|| format!("create manifest '{}'", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(f)),
        })
    }

    fn write_line(&self, record: serde_json::Value) -> animata::AnimataResult<()> {
        let mut w = self
            .writer
            .lock()
            .map_err(|_| animata::AnimataError::job("manifest writer poisoned"))?;
        serde_json::to_writer(&mut *w, &record)
            .map_err(|e| animata::AnimataError::serde(e.to_string()))?;
        writeln!(w).map_err(|e| animata::AnimataError::serde(e.to_string()))?;
        Ok(())
    }
}

impl animata::FrameSink for ManifestSink {
    fn render_frame(
        &self,
        composition: &animata::Composition,
    ) -> animata::AnimataResult<animata::FrameHandle> {
        self.write_line(serde_json::json!({
            "kind": "frame",
            "frame": composition.frame.0,
            "scene": composition.scene_id.clone(),
            "layers": composition.layers.len(),
            "transitions": composition.transitions.len(),
        }))?;
        Ok(animata::FrameHandle(composition.frame.0))
    }

    fn encode(
        &self,
        frames: &[animata::FrameHandle],
        spec: &animata::EncodeSpec,
    ) -> animata::AnimataResult<animata::OutputHandle> {
        self.write_line(serde_json::json!({
            "kind": "encode",
            "frames": frames.len(),
            "format": spec.format.extension(),
            "width": spec.width,
            "height": spec.height,
            "fps": spec.fps,
            "bitrate_kbps": spec.quality.bitrate_kbps,
        }))?;
        if let Ok(mut w) = self.writer.lock() {
            let _ = w.flush();
        }
        Ok(animata::OutputHandle {
            url: self.path.display().to_string(),
        })
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    let sink = Arc::new(ManifestSink::create(&args.out)?);

    let mode = if args.preview {
        animata::RenderMode::Preview {
            frame_budget: animata::job::DEFAULT_PREVIEW_FRAME_BUDGET,
        }
    } else {
        animata::RenderMode::Final
    };

    let orchestrator = Orchestrator::new(sink, animata::job::DEFAULT_MAX_CONCURRENT);
    let last_decile = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let options = animata::RenderOptions {
        mode,
        format: args.format,
        resolution: args.resolution,
        quality: args.quality,
        on_stage_change: Some(Arc::new(|stage| eprintln!("stage: {stage}"))),
        on_progress: Some(Arc::new(move |pct, stage| {
            let decile = (pct / 10.0) as u64;
            if decile > last_decile.swap(decile, std::sync::atomic::Ordering::Relaxed) {
                eprintln!("{:>5.1}% ({stage})", pct);
            }
        })),
        ..Default::default()
    };

    let id = orchestrator.submit(&project, options)?;
    let status = orchestrator
        .wait_terminal(&id, Duration::from_secs(3600))
        .context("job vanished from the table")?;

    let job = orchestrator
        .status(&id)
        .context("job vanished from the table")?;
    match status {
        animata::JobStatus::Completed => {
            eprintln!("wrote {}", job.output_url.unwrap_or_default());
            Ok(())
        }
        _ => anyhow::bail!(
            "render failed: {}",
            job.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}
