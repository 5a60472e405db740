use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};

use layerfade::{
    FfmpegSink, FfmpegSinkOpts, FrameIndex, FrameRange, JobSpec, PngSequenceSink, PreparedJob,
    RenderOpts, RenderSession, RenderStats,
};

#[derive(Parser, Debug)]
#[command(name = "layerfade", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render a range of frames as a PNG sequence (`frame_00001.png`, ...).
    Frames(FramesArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Emit the job as an ffmpeg filter graph, or run it.
    Graph(GraphArgs),
    /// Print the frame counts and canvas of a job without rendering.
    Info(InfoArgs),
}

#[derive(Args, Debug)]
struct JobArgs {
    /// Job description JSON. Relative asset paths are resolved against its directory.
    #[arg(long = "job")]
    job_path: PathBuf,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Render on the calling thread only.
    #[arg(long, default_value_t = false)]
    sequential: bool,

    /// Override rayon worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Frames dispatched per chunk.
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Render every frame even when an identical one was just rendered.
    #[arg(long, default_value_t = false)]
    no_elision: bool,
}

impl SessionArgs {
    fn opts(&self) -> RenderOpts {
        RenderOpts {
            parallel: !self.sequential,
            chunk_size: self.chunk_size,
            threads: self.threads,
            static_frame_elision: !self.no_elision,
            ..RenderOpts::default()
        }
    }
}

#[derive(Parser, Debug)]
struct FrameArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Frame index (1-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct FramesArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Output directory.
    #[arg(long)]
    out_dir: PathBuf,

    /// First frame to render (1-based, inclusive).
    #[arg(long)]
    start: Option<u64>,

    /// Last frame to render (inclusive). Defaults to the last frame of the job.
    #[arg(long)]
    end: Option<u64>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Fail instead of overwriting an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,

    /// Write a PNG sequence into this directory first and assemble it, instead of piping raw
    /// frames into ffmpeg. The directory must not already hold frame files.
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct GraphArgs {
    #[command(flatten)]
    job: JobArgs,

    /// Run the graph with ffmpeg and write this MP4 instead of printing it.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print the whole ffmpeg command line rather than only the filter graph.
    #[arg(long, default_value_t = false)]
    command: bool,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    #[command(flatten)]
    job: JobArgs,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Frames(args) => cmd_frames(args),
        Command::Render(args) => cmd_render(args),
        Command::Graph(args) => cmd_graph(args),
        Command::Info(args) => cmd_info(args),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    // A subscriber may already be installed when embedded; logging is best-effort.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_spec(args: &JobArgs) -> anyhow::Result<JobSpec> {
    let spec = JobSpec::from_path(&args.job_path)
        .with_context(|| format!("load job '{}'", args.job_path.display()))?;
    let root = args.job_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(spec.resolved_against(root))
}

fn prepare(args: &JobArgs) -> anyhow::Result<Arc<PreparedJob>> {
    let spec = load_spec(args)?;
    let job = PreparedJob::prepare(&spec).context("prepare job")?;
    Ok(Arc::new(job))
}

fn report(stats: RenderStats) {
    eprintln!(
        "frames: {} total, {} rendered, {} elided",
        stats.frames_total, stats.frames_rendered, stats.frames_elided
    );
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let job = prepare(&args.job)?;
    let sess = RenderSession::new(job, RenderOpts::sequential())?;
    let frame = sess.render_frame(FrameIndex(args.frame))?;

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

fn cmd_frames(args: FramesArgs) -> anyhow::Result<()> {
    let job = prepare(&args.job)?;
    let total = job.timing().total_frames();
    let start = args.start.unwrap_or(1);
    let end = args.end.unwrap_or(total);
    let range = FrameRange::new(FrameIndex(start), FrameIndex(end.saturating_add(1)))?;

    let sess = RenderSession::new(job, args.session.opts())?;
    let mut sink = PngSequenceSink::new(&args.out_dir);
    let stats = sess.render_range(range, &mut sink)?;

    report(stats);
    eprintln!("wrote {} frames to {}", sink.written(), args.out_dir.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let opts = FfmpegSinkOpts {
        overwrite: !args.no_overwrite,
        ..FfmpegSinkOpts::new(&args.out)
    };
    if let Some(dir) = args.frames_dir.as_deref() {
        let stale = layerfade::count_frame_files(dir)?;
        if stale > 0 {
            anyhow::bail!(
                "frames dir '{}' already holds {stale} frame files; use an empty directory",
                dir.display()
            );
        }
    }

    let job = prepare(&args.job)?;
    let sess = RenderSession::new(job, args.session.opts())?;

    let stats = match args.frames_dir.as_deref() {
        Some(dir) => {
            let mut sink = PngSequenceSink::new(dir);
            let stats = sess.render_all(&mut sink)?;
            let cfg = sess.sink_config(sess.job().timing().frame_range());
            layerfade::encode_png_sequence(dir, &cfg, &opts)?;
            stats
        }
        None => sess.render_all(&mut FfmpegSink::new(opts))?,
    };

    report(stats);
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_graph(args: GraphArgs) -> anyhow::Result<()> {
    let spec = load_spec(&args.job)?;
    let job = PreparedJob::prepare(&spec).context("prepare job")?;
    let graph = layerfade::build_filter_graph(
        job.timing(),
        &spec.assets,
        job.geometry(),
        layerfade::DEFAULT_BG_RGBA,
    )?;

    if let Some(out) = args.out.as_deref() {
        layerfade::run_filter_graph(&graph, &FfmpegSinkOpts::new(out))?;
        eprintln!("wrote {}", out.display());
        return Ok(());
    }

    if args.command {
        let line = layerfade::encode::ffmpeg::filter_graph_command_line(&graph, Path::new("out.mp4"))
            .iter()
            .map(|a| shell_quote(&a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ");
        println!("ffmpeg {line}");
    } else {
        for chain in graph.chains() {
            println!("{chain};");
        }
    }
    Ok(())
}

fn cmd_info(args: InfoArgs) -> anyhow::Result<()> {
    let spec = load_spec(&args.job)?;
    let timing = spec.timing_config()?;
    let content = layerfade::assets::decode::read_size(&spec.assets.background)?;
    let overlay = spec
        .assets
        .overlay
        .as_deref()
        .map(layerfade::assets::decode::read_size)
        .transpose()?;
    let geometry = layerfade::compute_geometry(content, overlay, spec.overlay_fit)?;
    let fps = timing.fps();

    println!("layers:       {}", timing.layer_count());
    println!(
        "cycle:        {} frames ({} fade + {} still)",
        timing.cycle_length(),
        timing.fade_frames(),
        timing.still_frames()
    );
    println!("main frames:  {}", timing.main_frames());
    println!("outro frames: {}", timing.outro_fade_frames());
    println!(
        "total frames: {} ({:.3}s at {}/{} fps)",
        timing.total_frames(),
        fps.frames_to_secs(timing.total_frames()),
        fps.num,
        fps.den
    );
    println!(
        "canvas:       {} (content {} at {},{}; overlay {})",
        geometry.canvas,
        geometry.content,
        geometry.offset.0,
        geometry.offset.1,
        if geometry.overlay { "used" } else { "none" }
    );
    Ok(())
}

fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c))
    {
        s.to_owned()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
