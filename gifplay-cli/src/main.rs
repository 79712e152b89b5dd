//! `gifplay`: probe a GIF's metadata or play it headlessly for a while.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gp_common::{CachingStrategy, Dimensions, GifMetadata, PlayerConfig, RestoreStrategy, ScaleType};
use gp_decoder::{GifEngine, GifSource, SessionManager};
use gp_player::{AnimationScheduler, FrameView, Phase, PlaybackBuilder, Surface};

#[derive(Parser, Debug)]
#[command(name = "gifplay", version, about = "Probe or headlessly play a GIF")]
struct Args {
    /// GIF file to open.
    path: PathBuf,

    /// Print metadata and exit without playing.
    #[arg(long)]
    probe: bool,

    /// Frame to fast-forward to before the first paint.
    #[arg(long, default_value_t = 0)]
    offset: u32,

    /// Frame caching strategy (overrides the config file).
    #[arg(long, value_enum)]
    caching: Option<CachingArg>,

    #[arg(long, value_enum, default_value_t = RestoreArg::Restart)]
    restore: RestoreArg,

    #[arg(long, value_enum, default_value_t = ScaleArg::Center)]
    scale: ScaleArg,

    /// Hide and show the surface once halfway through playback.
    #[arg(long)]
    toggle_visibility: bool,

    /// JSON player configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// How long to play for.
    #[arg(long, default_value_t = 2000)]
    duration_ms: u64,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CachingArg {
    Disabled,
    WhenDecoded,
    PreCache,
}

impl From<CachingArg> for CachingStrategy {
    fn from(arg: CachingArg) -> Self {
        match arg {
            CachingArg::Disabled => Self::Disabled,
            CachingArg::WhenDecoded => Self::WhenDecoded,
            CachingArg::PreCache => Self::PreCache,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RestoreArg {
    Restart,
    LastFrame,
}

impl From<RestoreArg> for RestoreStrategy {
    fn from(arg: RestoreArg) -> Self {
        match arg {
            RestoreArg::Restart => Self::Restart,
            RestoreArg::LastFrame => Self::LastFrame,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ScaleArg {
    Fill,
    Start,
    Center,
    End,
}

impl From<ScaleArg> for ScaleType {
    fn from(arg: ScaleArg) -> Self {
        match arg {
            ScaleArg::Fill => Self::Fill,
            ScaleArg::Start => Self::Start,
            ScaleArg::Center => Self::Center,
            ScaleArg::End => Self::End,
        }
    }
}

/// Surface that only counts what it is shown.
#[derive(Default)]
struct StatsSurface {
    presented: AtomicU64,
    frames: Mutex<Vec<u32>>,
    buffer: Mutex<Option<Dimensions>>,
}

impl Surface for StatsSurface {
    fn present(&self, frame: FrameView<'_>) {
        self.presented.fetch_add(1, Ordering::Relaxed);
        self.frames.lock().push(frame.index);
    }

    fn buffer_changed(&self, dims: Option<Dimensions>) {
        *self.buffer.lock() = dims;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &args.config {
        Some(path) => PlayerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PlayerConfig::default(),
    };
    if let Some(caching) = args.caching {
        config.caching_strategy = caching.into();
    }

    let manager = Arc::new(SessionManager::from_config(GifEngine::new(), &config));

    if args.probe {
        return probe(&manager, &args);
    }
    play(manager, config, &args)
}

fn probe(manager: &SessionManager, args: &Args) -> Result<()> {
    let id = manager
        .load(GifSource::path(&args.path))
        .with_context(|| format!("Failed to load {}", args.path.display()))?;
    let meta = manager.metadata(id)?;
    manager.destroy(id);

    print_metadata(&meta);
    Ok(())
}

fn print_metadata(meta: &GifMetadata) {
    println!("size:      {}", meta.dimensions());
    println!("frames:    {}", meta.frame_count);
    println!("animated:  {}", meta.is_animated());
    println!("status:    {:?}", meta.status);
    if !meta.status.is_ok() {
        warn!(status = ?meta.status, "GIF did not decode cleanly");
    }
    println!("loop:      {} ms", meta.loop_duration_ms());
    let delays: Vec<String> = meta.delays.values().map(i32::to_string).collect();
    println!("delays:    [{}]", delays.join(", "));
}

fn play(manager: Arc<SessionManager>, config: PlayerConfig, args: &Args) -> Result<()> {
    let surface = Arc::new(StatsSurface::default());
    let scheduler = AnimationScheduler::new(
        Arc::clone(&manager),
        Arc::clone(&surface) as Arc<dyn Surface>,
        config,
    );

    scheduler.attach();
    let loaded = PlaybackBuilder::new()
        .with_path(&args.path)
        .with_offset(args.offset)
        .with_scale_type(args.scale.into())
        .with_restore_strategy(args.restore.into())
        .build()
        .apply_to(&scheduler);
    if !loaded {
        bail!("Failed to load {}", args.path.display());
    }
    print_metadata(&scheduler.metadata());

    let started = Instant::now();
    let duration = Duration::from_millis(args.duration_ms);
    let mut toggled = !args.toggle_visibility;
    while started.elapsed() < duration {
        if !toggled && started.elapsed() >= duration / 2 {
            info!(frame = scheduler.current_frame(), "Toggling visibility");
            scheduler.detach();
            scheduler.attach();
            toggled = true;
        }
        if scheduler.phase() == Phase::Stopped {
            info!(frame = scheduler.current_frame(), "Animation reached a terminal frame");
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    scheduler.stop();

    let frames = surface.frames.lock();
    println!(
        "presented: {} frames in {} ms",
        surface.presented.load(Ordering::Relaxed),
        started.elapsed().as_millis()
    );
    if let (Some(first), Some(last)) = (frames.first(), frames.last()) {
        println!("first:     {first}");
        println!("last:      {last}");
    }
    if let Some(dims) = *surface.buffer.lock() {
        println!("buffer:    {dims} still held");
    }
    Ok(())
}
