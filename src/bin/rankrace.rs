use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use rankrace::{assets::fonts::FontSet, config::RaceConfig, data::event::load_events};

#[derive(Parser, Debug)]
#[command(name = "rankrace", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Play-event history JSON.
    #[arg(long)]
    events: PathBuf,

    /// Run configuration JSON.
    #[arg(long)]
    config: PathBuf,

    /// Directory of thumbnail images named by entity (optional).
    #[arg(long)]
    thumbs: Option<PathBuf>,

    /// Font for title and date text (optional).
    #[arg(long)]
    heading_font: Option<PathBuf>,

    /// Font for bar labels and values (optional).
    #[arg(long)]
    label_font: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Frame index (0-based).
    #[arg(long)]
    frame: usize,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn load_inputs(
    common: &CommonArgs,
) -> anyhow::Result<(Vec<rankrace::PlayEvent>, RaceConfig, FontSet)> {
    let events = load_events(&common.events)?;
    let cfg = RaceConfig::load(&common.config)?;
    let fonts = FontSet::from_paths(
        common.heading_font.as_deref(),
        common.label_font.as_deref(),
    )?;
    Ok((events, cfg, fonts))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let (events, cfg, fonts) = load_inputs(&args.common)?;

    let frame = rankrace::render_single_frame(
        &events,
        &cfg,
        fonts,
        args.common.thumbs.as_deref(),
        args.frame,
    )?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let (events, cfg, fonts) = load_inputs(&args.common)?;

    rankrace::render_to_mp4(&events, &cfg, fonts, args.common.thumbs.as_deref(), &args.out)?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
