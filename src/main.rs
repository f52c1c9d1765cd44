use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use gallery_sync::load_snapshot;
use gallery_sync::sync::engine::{GallerySnapshot, SyncEngine, TagId};
use gallery_sync::sync::protocol::{FilterState, GalleryTransport, MemoryTransport, WebSocketTransport};
use gallery_sync::sync::runtime::SyncOrchestrator;

use std::path::PathBuf;
use std::time::Duration;

#[derive(ValueEnum, Clone, Debug)]
enum SyncMode {
    Live,
    Replay,
}

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// First-load snapshot: {"images": [...], "tags": [...], "imageTags": [...]}
    #[arg(long)]
    seed: PathBuf,

    #[arg(long, value_enum, default_value_t = SyncMode::Live)]
    mode: SyncMode,

    #[arg(long, default_value = "ws://127.0.0.1:8000/ws/gallery/")]
    url: String,

    /// Replay mode: file with one inbound JSON frame per line
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Tag id to toggle on after start (repeatable)
    #[arg(long = "filter")]
    filters: Vec<TagId>,

    /// Live mode: idle sleep and socket read poll interval
    #[arg(long, default_value_t = 20)]
    idle_ms: u64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    println!("[MAIN] Sync mode: {:?}", args.mode);

    let seed = load_snapshot(&args.seed)?;
    let engine = SyncEngine::new(seed);

    let snapshot = match args.mode {
        SyncMode::Live => run_live(&args, engine)?,
        SyncMode::Replay => run_replay(&args, engine)?,
    };

    print_summary(&snapshot);
    Ok(())
}

fn run_live(args: &Args, engine: SyncEngine) -> Result<std::sync::Arc<GallerySnapshot>> {
    let idle = Duration::from_millis(args.idle_ms);

    println!("[LIVE] Connecting to {}", args.url);
    let transport = WebSocketTransport::connect(&args.url, idle)?;

    let mut driver = SyncOrchestrator::new(engine, transport)
        .with_change_notifier(|snap| {
            log::info!(
                "[LIVE] revision {}: {} images, {} rendered",
                snap.revision,
                snap.data.images.len(),
                snap.rendered_images().len()
            );
        });

    driver.start().context("could not attach listener")?;
    toggle_filters(&mut driver, &args.filters)?;

    println!("[LIVE] Listening until the connection closes...");
    driver.run_until_closed(idle);

    let snapshot = driver.snapshot();
    driver.shutdown();
    Ok(snapshot)
}

fn run_replay(args: &Args, engine: SyncEngine) -> Result<std::sync::Arc<GallerySnapshot>> {
    let Some(path) = &args.frames else {
        bail!("--frames is required in replay mode");
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read frames file {}", path.display()))?;

    let mut driver = SyncOrchestrator::new(engine, MemoryTransport::new());
    driver.start().context("could not attach listener")?;
    toggle_filters(&mut driver, &args.filters)?;

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        driver.transport_mut().push_frame(line);
    }
    // Sends stay open so inbound filter changes can still be answered.
    driver.pump();

    println!("[REPLAY] Outbound frames:");
    for frame in &driver.transport().sent {
        println!("  {}", frame);
    }

    let stats = driver.stats();
    println!(
        "[REPLAY] {} frames, {} decode errors, {} drift, {} failed sends",
        stats.frames_handled, stats.decode_errors, stats.drift_reports, stats.send_failures
    );

    let snapshot = driver.snapshot();
    driver.shutdown();
    Ok(snapshot)
}

fn toggle_filters<C: GalleryTransport>(driver: &mut SyncOrchestrator<C>, filters: &[TagId]) -> Result<()> {
    for id in filters {
        driver.toggle_filter(*id, FilterState::On)?;
    }
    Ok(())
}

fn print_summary(snap: &GallerySnapshot) {
    let problems = snap.check_consistency();

    println!("-----------------------------------");
    println!("Revision:         {}", snap.revision);
    println!("Images:           {}", snap.data.images.len());
    println!("Rendered:         {:?}", snap.rendered_ids());
    println!("Tags:             {}", snap.data.tags.len());
    println!("Links:            {}", snap.data.links.len());
    println!("Active filters:   {:?}", snap.active_filters.as_slice());
    println!("Consistent:       {}", problems.is_empty());
    println!("-----------------------------------");

    for p in problems {
        println!("  ! {}", p);
    }
}
