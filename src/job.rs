use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    compose::{Composer, ComposerConfig, Composition},
    core::FrameIndex,
    error::{AnimataError, AnimataResult},
    model::Project,
    quality::{EncodeParams, OutputFormat, QualityTier, Resolution},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Stages of `Processing`. Full renders walk all six in order; previews
/// take the shortened `Initializing -> Composing -> Finalizing` path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Stage {
    Initializing,
    Composing,
    Rendering,
    Encoding,
    Optimizing,
    Finalizing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Composing => "composing",
            Self::Rendering => "rendering",
            Self::Encoding => "encoding",
            Self::Optimizing => "optimizing",
            Self::Finalizing => "finalizing",
        };
        write!(f, "{s}")
    }
}

/// One tracked render request. Owned by the orchestrator's job table;
/// removed only by [`Orchestrator::cleanup_finished`].
#[derive(Clone, Debug, serde::Serialize)]
pub struct RenderJob {
    pub id: String,
    pub status: JobStatus,
    /// Percentage in `[0, 100]`, monotonically non-decreasing.
    pub progress: f64,
    pub current_stage: Stage,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

/// The persistence/polling contract: exactly the fields external callers
/// may rely on.
#[derive(Clone, Debug, serde::Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub output_url: Option<String>,
    pub error: Option<String>,
}

/// Opaque per-frame handle issued by the external rasterizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHandle(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputHandle {
    pub url: String,
}

/// Everything the encoder needs besides the frames themselves.
#[derive(Clone, Debug)]
pub struct EncodeSpec {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub quality: EncodeParams,
}

/// The external rasterizer/encoder boundary. The orchestrator treats both
/// operations as opaque, replaceable services.
pub trait FrameSink: Send + Sync {
    fn render_frame(&self, composition: &Composition) -> AnimataResult<FrameHandle>;

    fn encode(&self, frames: &[FrameHandle], spec: &EncodeSpec) -> AnimataResult<OutputHandle>;

    /// Format-specific finalization (GIF palette optimization, Lottie
    /// export). Called only for formats that need it.
    fn post_process(
        &self,
        output: OutputHandle,
        _format: OutputFormat,
    ) -> AnimataResult<OutputHandle> {
        Ok(output)
    }
}

pub type ProgressFn = Arc<dyn Fn(f64, Stage) + Send + Sync>;
pub type StageFn = Arc<dyn Fn(Stage) + Send + Sync>;

pub const DEFAULT_MAX_CONCURRENT: usize = 2;
pub const DEFAULT_PREVIEW_FRAME_BUDGET: u64 = 150;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Every frame, full stage sequence.
    Final,
    /// Stride-sampled frames capped at `frame_budget`, shortened stages.
    Preview { frame_budget: u64 },
}

/// Per-job configuration. Callbacks are invoked synchronously at
/// well-defined points; callers must not block them for long.
#[derive(Clone)]
pub struct RenderOptions {
    pub mode: RenderMode,
    pub format: OutputFormat,
    pub resolution: Resolution,
    pub quality: QualityTier,
    pub stage_timeout: Option<Duration>,
    pub on_progress: Option<ProgressFn>,
    pub on_stage_change: Option<StageFn>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            mode: RenderMode::Final,
            format: OutputFormat::Mp4,
            resolution: Resolution::R1080p,
            quality: QualityTier::Standard,
            stage_timeout: None,
            on_progress: None,
            on_stage_change: None,
        }
    }
}

struct QueuedJob {
    id: String,
    project: Arc<Project>,
    options: RenderOptions,
    cancel: Arc<AtomicBool>,
}

struct State {
    jobs: HashMap<String, RenderJob>,
    queue: VecDeque<QueuedJob>,
    cancel_flags: HashMap<String, Arc<AtomicBool>>,
    active: usize,
    next_id: u64,
}

struct Inner {
    sink: Arc<dyn FrameSink>,
    max_concurrent: usize,
    state: Mutex<State>,
}

/// Owns the render-job lifecycle: admission, FIFO queueing under a
/// concurrency cap, staged execution on worker threads, progress
/// aggregation and cooperative cancellation.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(sink: Arc<dyn FrameSink>, max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(State {
                    jobs: HashMap::new(),
                    queue: VecDeque::new(),
                    cancel_flags: HashMap::new(),
                    active: 0,
                    next_id: 0,
                }),
            }),
        }
    }

    /// Admit a render request. Validation failures block admission with the
    /// full structured issue list; admitted jobs start immediately when a
    /// slot is free and queue FIFO otherwise.
    #[tracing::instrument(skip(self, project, options))]
    pub fn submit(&self, project: &Project, options: RenderOptions) -> AnimataResult<String> {
        let mut snapshot = project.clone();
        snapshot.reconcile();
        let issues = snapshot.validate_all();
        if !issues.is_empty() {
            let joined = issues
                .iter()
                .map(|i| format!("{}: {}", i.location, i.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(AnimataError::validation(joined));
        }

        let id = {
            let mut state = lock_state(&self.inner);
            state.next_id += 1;
            let id = format!("job-{}", state.next_id);
            let cancel = Arc::new(AtomicBool::new(false));
            state.jobs.insert(
                id.clone(),
                RenderJob {
                    id: id.clone(),
                    status: JobStatus::Pending,
                    progress: 0.0,
                    current_stage: Stage::Initializing,
                    start_ms: None,
                    end_ms: None,
                    output_url: None,
                    error: None,
                },
            );
            state.cancel_flags.insert(id.clone(), cancel.clone());
            state.queue.push_back(QueuedJob {
                id: id.clone(),
                project: Arc::new(snapshot),
                options,
                cancel,
            });
            id
        };

        schedule(&self.inner);
        tracing::debug!(job = %id, "render job admitted");
        Ok(id)
    }

    pub fn status(&self, id: &str) -> Option<RenderJob> {
        lock_state(&self.inner).jobs.get(id).cloned()
    }

    pub fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        lock_state(&self.inner).jobs.get(id).map(|j| JobSnapshot {
            id: j.id.clone(),
            status: j.status,
            progress: j.progress,
            output_url: j.output_url.clone(),
            error: j.error.clone(),
        })
    }

    pub fn active_count(&self) -> usize {
        lock_state(&self.inner).active
    }

    /// Request cancellation. A queued job fails immediately; a processing
    /// job stops cooperatively at its next frame boundary.
    pub fn cancel(&self, id: &str) -> AnimataResult<()> {
        let mut state = lock_state(&self.inner);
        let job = state
            .jobs
            .get(id)
            .ok_or_else(|| AnimataError::job(format!("unknown job '{id}'")))?;

        match job.status {
            JobStatus::Completed | JobStatus::Failed => Err(AnimataError::job(format!(
                "job '{id}' already finished"
            ))),
            JobStatus::Pending => {
                state.queue.retain(|q| q.id != id);
                if let Some(flag) = state.cancel_flags.get(id) {
                    flag.store(true, Ordering::Relaxed);
                }
                if let Some(job) = state.jobs.get_mut(id) {
                    job.status = JobStatus::Failed;
                    job.error = Some("job cancelled before start".to_string());
                    job.end_ms = Some(now_ms());
                }
                Ok(())
            }
            JobStatus::Processing => {
                if let Some(flag) = state.cancel_flags.get(id) {
                    flag.store(true, Ordering::Relaxed);
                }
                Ok(())
            }
        }
    }

    /// Drop terminal jobs (and their cancel flags) from the table.
    pub fn cleanup_finished(&self) -> usize {
        let mut state = lock_state(&self.inner);
        let before = state.jobs.len();
        let keep: Vec<String> = state
            .jobs
            .values()
            .filter(|j| !j.status.is_terminal())
            .map(|j| j.id.clone())
            .collect();
        state.jobs.retain(|_, j| !j.status.is_terminal());
        state.cancel_flags.retain(|id, _| keep.contains(id));
        before - state.jobs.len()
    }

    /// Poll until the job reaches a terminal status or `timeout` elapses.
    pub fn wait_terminal(&self, id: &str, timeout: Duration) -> Option<JobStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            let status = self.status(id)?.status;
            if status.is_terminal() {
                return Some(status);
            }
            if Instant::now() >= deadline {
                return Some(status);
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn lock_state(inner: &Inner) -> std::sync::MutexGuard<'_, State> {
    // Worker threads never panic while holding the lock; recover anyway so
    // one poisoned mutex cannot wedge the whole job table.
    inner.state.lock().unwrap_or_else(|e| e.into_inner())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Start queued jobs while slots are free. Threads are spawned outside the
/// state lock.
fn schedule(inner: &Arc<Inner>) {
    loop {
        let next = {
            let mut state = lock_state(inner);
            if state.active >= inner.max_concurrent {
                return;
            }
            let Some(queued) = state.queue.pop_front() else {
                return;
            };
            state.active += 1;
            if let Some(job) = state.jobs.get_mut(&queued.id) {
                job.status = JobStatus::Processing;
                job.start_ms = Some(now_ms());
            }
            queued
        };

        let inner = Arc::clone(inner);
        thread::spawn(move || {
            let id = next.id.clone();
            tracing::info!(job = %id, "render job started");
            let result = run_job(&inner, &next);

            {
                let mut state = lock_state(&inner);
                state.active = state.active.saturating_sub(1);
                if let Some(job) = state.jobs.get_mut(&id) {
                    job.end_ms = Some(now_ms());
                    match &result {
                        Ok(url) => {
                            job.status = JobStatus::Completed;
                            job.progress = 100.0;
                            job.output_url = Some(url.clone());
                        }
                        Err(e) => {
                            job.status = JobStatus::Failed;
                            job.error = Some(e.to_string());
                        }
                    }
                }
            }

            match result {
                Ok(_) => tracing::info!(job = %id, "render job completed"),
                Err(e) => tracing::warn!(job = %id, error = %e, "render job failed"),
            }

            // A slot just freed: pull the next queued job, if any.
            schedule(&inner);
        });
    }
}

struct JobCtx<'a> {
    inner: &'a Inner,
    queued: &'a QueuedJob,
    stage: Stage,
    stage_entered: bool,
    stage_started: Instant,
}

impl<'a> JobCtx<'a> {
    fn new(inner: &'a Inner, queued: &'a QueuedJob) -> Self {
        Self {
            inner,
            queued,
            stage: Stage::Initializing,
            stage_entered: false,
            stage_started: Instant::now(),
        }
    }

    fn enter_stage(&mut self, stage: Stage) {
        if self.stage_entered && self.stage == stage {
            return;
        }
        self.stage_entered = true;
        self.stage = stage;
        self.stage_started = Instant::now();
        {
            let mut state = lock_state(self.inner);
            if let Some(job) = state.jobs.get_mut(&self.queued.id) {
                job.current_stage = stage;
            }
        }
        // Callbacks run outside the state lock.
        if let Some(cb) = &self.queued.options.on_stage_change {
            cb(stage);
        }
        tracing::debug!(job = %self.queued.id, stage = %stage, "stage change");
    }

    /// Record monotone progress and notify.
    fn report(&self, percent: f64) {
        let percent = {
            let mut state = lock_state(self.inner);
            let Some(job) = state.jobs.get_mut(&self.queued.id) else {
                return;
            };
            job.progress = job.progress.max(percent.clamp(0.0, 100.0));
            job.progress
        };
        if let Some(cb) = &self.queued.options.on_progress {
            cb(percent, self.stage);
        }
    }

    /// Cooperative checkpoint between frames and stages.
    fn checkpoint(&self) -> AnimataResult<()> {
        if self.queued.cancel.load(Ordering::Relaxed) {
            return Err(AnimataError::job("job cancelled by request"));
        }
        if let Some(timeout) = self.queued.options.stage_timeout {
            if self.stage_started.elapsed() > timeout {
                return Err(AnimataError::job(format!(
                    "stage '{}' stalled (exceeded {:?})",
                    self.stage, timeout
                )));
            }
        }
        Ok(())
    }
}

fn encode_spec(project: &Project, options: &RenderOptions) -> EncodeSpec {
    let (width, height) = options.resolution.dimensions();
    EncodeSpec {
        format: options.format,
        width,
        height,
        fps: project.fps.as_f64(),
        quality: options.quality.encode_params(),
    }
}

fn compose_frame(
    composer: &mut Composer,
    project: &Project,
    frame: FrameIndex,
) -> AnimataResult<Composition> {
    match project.scene_at(frame) {
        Some(scene) => composer.compose(scene, frame, project.fps),
        None => Ok(Composition::blank(frame)),
    }
}

fn run_job(inner: &Inner, queued: &QueuedJob) -> AnimataResult<String> {
    let mut ctx = JobCtx::new(inner, queued);
    let project = &queued.project;
    let options = &queued.options;
    let mut composer = Composer::new(ComposerConfig::default());

    ctx.enter_stage(Stage::Initializing);
    ctx.report(0.0);
    ctx.checkpoint()?;

    match options.mode {
        RenderMode::Preview { frame_budget } => {
            run_preview(&mut ctx, project, options, &mut composer, frame_budget)
        }
        RenderMode::Final => run_final(&mut ctx, project, options, &mut composer),
    }
}

/// Full render: every frame in order, all six stages, progress split
/// composing+rendering 0-80, encoding 80-90, optimizing 90-100.
fn run_final(
    ctx: &mut JobCtx<'_>,
    project: &Project,
    options: &RenderOptions,
    composer: &mut Composer,
) -> AnimataResult<String> {
    let total = project.duration;

    ctx.enter_stage(Stage::Composing);
    let mut compositions = Vec::with_capacity(total.min(4096) as usize);
    for f in 0..total {
        ctx.checkpoint()?;
        compositions.push(compose_frame(composer, project, FrameIndex(f))?);
        ctx.report(40.0 * ((f + 1) as f64) / (total as f64));
    }

    ctx.enter_stage(Stage::Rendering);
    let mut handles = Vec::with_capacity(compositions.len());
    for (i, comp) in compositions.iter().enumerate() {
        ctx.checkpoint()?;
        handles.push(ctx.inner.sink.render_frame(comp)?);
        ctx.report(40.0 + 40.0 * ((i + 1) as f64) / (total as f64));
    }

    ctx.enter_stage(Stage::Encoding);
    ctx.checkpoint()?;
    let spec = encode_spec(project, options);
    let output = ctx.inner.sink.encode(&handles, &spec)?;
    ctx.report(90.0);

    ctx.enter_stage(Stage::Optimizing);
    ctx.checkpoint()?;
    let output = if options.format.needs_post_process() {
        ctx.inner.sink.post_process(output, options.format)?
    } else {
        output
    };
    ctx.report(100.0);

    ctx.enter_stage(Stage::Finalizing);
    Ok(output.url)
}

/// Preview render: stride-sampled frames for turnaround, shortened stage
/// path. Stride = ceil(total / budget).
fn run_preview(
    ctx: &mut JobCtx<'_>,
    project: &Project,
    options: &RenderOptions,
    composer: &mut Composer,
    frame_budget: u64,
) -> AnimataResult<String> {
    let total = project.duration;
    let budget = frame_budget.max(1);
    let stride = total.div_ceil(budget).max(1);
    let sampled: Vec<u64> = (0..total).step_by(stride as usize).collect();

    ctx.enter_stage(Stage::Composing);
    let mut handles = Vec::with_capacity(sampled.len());
    for (i, &f) in sampled.iter().enumerate() {
        ctx.checkpoint()?;
        let comp = compose_frame(composer, project, FrameIndex(f))?;
        handles.push(ctx.inner.sink.render_frame(&comp)?);
        ctx.report(95.0 * ((i + 1) as f64) / (sampled.len() as f64));
    }

    ctx.enter_stage(Stage::Finalizing);
    ctx.checkpoint()?;
    let spec = encode_spec(project, options);
    let output = ctx.inner.sink.encode(&handles, &spec)?;
    ctx.report(100.0);
    Ok(output.url)
}
