use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::encode::png::FRAME_PATTERN;
use crate::encode::sink::{FrameSink, OrderGuard, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex, Size};
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::foundation::math::mul_div255_u16;
use crate::graph::filter::{FilterGraph, flatten_chains};
use crate::render::frame::FrameRGBA;

/// Opaque black, the colour transparent pixels are flattened onto by default.
pub const DEFAULT_BG_RGBA: [u8; 4] = [0, 0, 0, 255];

/// Options for [`FfmpegSink`] MP4 output.
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// Output MP4 file path.
    pub out_path: PathBuf,
    /// Overwrite output file if it already exists.
    pub overwrite: bool,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// The ffmpeg executable, looked up on `PATH` when it is a bare name.
    pub program: PathBuf,
}

impl FfmpegSinkOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
            bg_rgba: DEFAULT_BG_RGBA,
            program: PathBuf::from("ffmpeg"),
        }
    }
}

/// Hidden sibling of `out_path` that ffmpeg writes to until encoding succeeds.
pub fn staged_path(out_path: &Path) -> PathBuf {
    let name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_owned());
    out_path.with_file_name(format!(".{name}.partial"))
}

/// Encoder output that only reaches its destination through [`StagedOutput::commit`].
///
/// Dropping an uncommitted value removes the staged file.
#[derive(Debug)]
struct StagedOutput {
    staged: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedOutput {
    fn new(dest: &Path) -> Self {
        Self {
            staged: staged_path(dest),
            dest: dest.to_owned(),
            committed: false,
        }
    }

    fn commit(mut self) -> LayerfadeResult<()> {
        std::fs::rename(&self.staged, &self.dest).map_err(|e| {
            LayerfadeError::encode(format!(
                "failed to move '{}' to '{}': {e}",
                self.staged.display(),
                self.dest.display()
            ))
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.staged);
        }
    }
}

/// Spawns the system `ffmpeg` and streams raw frames to its stdin.
///
/// The video is written next to `out_path` and renamed into place by `end`. A sink dropped
/// before `end` (an aborted or cancelled render) kills ffmpeg and leaves no file behind.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<StderrDrain>,
    output: Option<StagedOutput>,

    scratch: Vec<u8>,
    cfg: Option<SinkConfig>,
    guard: OrderGuard,
}

impl FfmpegSink {
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            output: None,
            scratch: Vec::new(),
            cfg: None,
            guard: OrderGuard::default(),
        }
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerfadeResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(LayerfadeError::encode(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(LayerfadeError::encode(
                "ffmpeg sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        prepare_output(&self.opts)?;
        let output = StagedOutput::new(&self.opts.out_path);

        let mut cmd = ffmpeg_command(&self.opts.program);
        cmd.stdin(Stdio::piped());
        cmd.args([
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0"]);
        push_h264_output(&mut cmd);
        cmd.arg(&output.staged);

        let (mut child, stderr_drain) = spawn_with_stderr(cmd)?;
        let Some(stdin) = child.stdin.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(LayerfadeError::encode("failed to open ffmpeg stdin (unexpected)"));
        };

        tracing::debug!(
            out = %self.opts.out_path.display(),
            width = cfg.width,
            height = cfg.height,
            frames = cfg.frames,
            "spawned ffmpeg"
        );
        self.scratch = vec![0u8; frame_len(&cfg)?];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.output = Some(output);
        self.cfg = Some(cfg);
        self.guard.reset();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> LayerfadeResult<()> {
        self.guard.accept("ffmpeg", self.cfg.as_ref(), idx, frame)?;
        flatten_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(LayerfadeError::encode("ffmpeg sink is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            LayerfadeError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn end(&mut self) -> LayerfadeResult<()> {
        drop(self.stdin.take());
        let child = self
            .child
            .take()
            .ok_or_else(|| LayerfadeError::encode("ffmpeg sink not started"))?;
        let output = self.output.take();
        wait_for(child, self.stderr_drain.take())?;
        self.cfg = None;
        match output {
            Some(output) => output.commit(),
            None => Ok(()),
        }
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            tracing::warn!(
                out = %self.opts.out_path.display(),
                "ffmpeg sink dropped before end; discarding partial output"
            );
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(drain) = self.stderr_drain.take() {
            let _ = drain.join();
        }
        // `output` is dropped after this, once ffmpeg no longer holds the file.
    }
}

/// Arguments (after the program name) that assemble the PNG sequence in `frames_dir`.
///
/// Frames are flattened over `bg_rgba` and exactly `cfg.frames` of them are encoded, starting
/// at `frame_00001.png`.
pub fn png_sequence_command_line(
    frames_dir: &Path,
    cfg: &SinkConfig,
    bg_rgba: [u8; 4],
    out_path: &Path,
) -> Vec<OsString> {
    let rate = format!("{}/{}", cfg.fps.num, cfg.fps.den);
    let canvas = Size::new(cfg.width, cfg.height);
    let mut args: Vec<OsString> = ["-framerate", rate.as_str(), "-start_number", "1", "-i"]
        .map(OsString::from)
        .into();
    args.push(frames_dir.join(FRAME_PATTERN).into_os_string());
    args.extend(
        [
            "-filter_complex".to_owned(),
            flatten_chains("0:v", bg_rgba, canvas, cfg.fps).join(";"),
            "-map".to_owned(),
            "[flat]".to_owned(),
            "-frames:v".to_owned(),
            cfg.frames.to_string(),
        ]
        .map(OsString::from),
    );
    args.extend(H264_OUTPUT.map(OsString::from));
    args.push(out_path.as_os_str().to_owned());
    args
}

/// Assemble a PNG sequence written by [`crate::PngSequenceSink`] into an MP4.
///
/// `cfg` is the configuration the sequence was rendered with.
pub fn encode_png_sequence(
    frames_dir: &Path,
    cfg: &SinkConfig,
    opts: &FfmpegSinkOpts,
) -> LayerfadeResult<()> {
    prepare_output(opts)?;
    let output = StagedOutput::new(&opts.out_path);

    let mut cmd = ffmpeg_command(&opts.program);
    cmd.args(png_sequence_command_line(
        frames_dir,
        cfg,
        opts.bg_rgba,
        &output.staged,
    ));

    let (child, drain) = spawn_with_stderr(cmd)?;
    wait_for(child, Some(drain))?;
    output.commit()?;
    tracing::info!(out = %opts.out_path.display(), frames = cfg.frames, "encoded png sequence");
    Ok(())
}

/// Let ffmpeg composite a job described by `graph` straight into `opts.out_path`.
///
/// The flatten colour is part of the graph; `opts.bg_rgba` is not consulted.
pub fn run_filter_graph(graph: &FilterGraph, opts: &FfmpegSinkOpts) -> LayerfadeResult<()> {
    prepare_output(opts)?;
    let output = StagedOutput::new(&opts.out_path);

    let mut cmd = ffmpeg_command(&opts.program);
    cmd.args(graph.ffmpeg_args(&output.staged));

    let (child, drain) = spawn_with_stderr(cmd)?;
    wait_for(child, Some(drain))?;
    output.commit()?;
    tracing::info!(
        out = %opts.out_path.display(),
        frames = graph.total_frames(),
        "rendered filter graph"
    );
    Ok(())
}

/// Full argument list (after the program name) for rendering `graph` into `out_path`.
pub fn filter_graph_command_line(graph: &FilterGraph, out_path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-loglevel", "error"].map(OsString::from).into();
    args.extend(graph.ffmpeg_args(out_path));
    args
}

// The staged file may be left over from a crashed run, so it is always overwritten; the
// destination itself is checked in `prepare_output`.
fn ffmpeg_command(program: &Path) -> Command {
    let mut cmd = Command::new(program);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd.args(["-y", "-loglevel", "error"]);
    cmd
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

// `-f mp4`: the staged file name carries no usable extension.
const H264_OUTPUT: [&str; 13] = [
    "-an",
    "-c:v",
    "libx264",
    "-profile:v",
    "high",
    "-crf",
    "20",
    "-pix_fmt",
    "yuv420p",
    "-movflags",
    "+faststart",
    "-f",
    "mp4",
];

fn push_h264_output(cmd: &mut Command) {
    cmd.args(H264_OUTPUT);
}

fn prepare_output(opts: &FfmpegSinkOpts) -> LayerfadeResult<()> {
    ensure_parent_dir(&opts.out_path)?;
    if !opts.overwrite && opts.out_path.exists() {
        return Err(LayerfadeError::encode(format!(
            "output file '{}' already exists",
            opts.out_path.display()
        )));
    }
    if !program_runs(&opts.program) {
        return Err(LayerfadeError::encode(format!(
            "ffmpeg is required for MP4 encoding, but '{}' could not be run",
            opts.program.display()
        )));
    }
    Ok(())
}

type StderrDrain = std::thread::JoinHandle<std::io::Result<Vec<u8>>>;

fn spawn_with_stderr(mut cmd: Command) -> LayerfadeResult<(Child, StderrDrain)> {
    let mut child = cmd.spawn().map_err(|e| {
        LayerfadeError::encode(format!(
            "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
        ))
    })?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| LayerfadeError::encode("failed to open ffmpeg stderr (unexpected)"))?;
    let drain = std::thread::spawn(move || {
        let mut stderr_bytes = Vec::new();
        stderr.read_to_end(&mut stderr_bytes)?;
        Ok(stderr_bytes)
    });
    Ok((child, drain))
}

fn wait_for(mut child: Child, drain: Option<StderrDrain>) -> LayerfadeResult<()> {
    let status = child.wait().map_err(|e| {
        LayerfadeError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
    })?;
    let stderr_bytes = match drain {
        Some(handle) => handle
            .join()
            .map_err(|_| LayerfadeError::encode("ffmpeg stderr drain thread panicked"))?
            .map_err(|e| LayerfadeError::encode(format!("ffmpeg stderr read failed: {e}")))?,
        None => Vec::new(),
    };

    if !status.success() {
        let stderr = String::from_utf8_lossy(&stderr_bytes);
        return Err(LayerfadeError::encode(format!(
            "ffmpeg exited with status {}: {}",
            status,
            stderr.trim()
        )));
    }
    Ok(())
}

fn frame_len(cfg: &SinkConfig) -> LayerfadeResult<usize> {
    Size::new(cfg.width, cfg.height).rgba_len()
}

/// Flatten straight-alpha RGBA8 over an opaque background colour.
fn flatten_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src: &[u8],
    bg_rgba: [u8; 4],
) -> LayerfadeResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(LayerfadeError::encode(
            "flatten_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for i in 0..3 {
            let c = mul_div255_u16(u16::from(s[i]), a) + mul_div255_u16(u16::from(bg_rgba[i]), inv);
            d[i] = c.min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> LayerfadeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    program_runs(Path::new("ffmpeg"))
}

fn program_runs(program: &Path) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
