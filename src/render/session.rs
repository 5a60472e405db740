use std::collections::HashMap;
use std::sync::{Arc, mpsc};

use rayon::prelude::*;

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::job::PreparedJob;
use crate::render::cancel::CancelToken;
use crate::render::compositor::{Scratch, composite};
use crate::render::frame::FrameRGBA;
use crate::timing::opacity::OpacityVector;

const MAX_REORDER_BUFFER_BYTES: u64 = 128 * 1024 * 1024;

/// Options controlling [`RenderSession`] range rendering.
#[derive(Clone, Debug)]
pub struct RenderOpts {
    /// Render frames on a dedicated rayon pool. `false` renders on the calling thread.
    pub parallel: bool,
    /// Frames dispatched per chunk.
    pub chunk_size: usize,
    /// Override the number of worker threads. `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Render each distinct opacity vector of a chunk once and reuse the frame.
    pub static_frame_elision: bool,
    /// Bounded channel capacity between render workers and the sink thread.
    pub channel_capacity: usize,
}

impl Default for RenderOpts {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: 64,
            threads: None,
            static_frame_elision: true,
            channel_capacity: 4,
        }
    }
}

impl RenderOpts {
    /// Single worker on the calling thread, no elision.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            static_frame_elision: false,
            ..Self::default()
        }
    }
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Total frames in the requested range.
    pub frames_total: u64,
    /// Frames actually composited.
    pub frames_rendered: u64,
    /// Frames delivered from an identical earlier frame of the same chunk.
    pub frames_elided: u64,
}

impl RenderStats {
    fn add(&mut self, other: RenderStats) {
        self.frames_total += other.frames_total;
        self.frames_rendered += other.frames_rendered;
        self.frames_elided += other.frames_elided;
    }
}

/// Renders frames of one prepared job.
///
/// Every frame depends only on its index and the shared read-only job, so frames can be computed
/// in any order on any worker. Sinks still see them strictly in index order.
pub struct RenderSession {
    job: Arc<PreparedJob>,
    opts: RenderOpts,
    cancel: CancelToken,
}

impl RenderSession {
    pub fn new(job: Arc<PreparedJob>, opts: RenderOpts) -> LayerfadeResult<Self> {
        if opts.threads == Some(0) {
            return Err(LayerfadeError::configuration(
                "render 'threads' must be >= 1 when set",
            ));
        }
        Ok(Self {
            job,
            opts,
            cancel: CancelToken::new(),
        })
    }

    /// Use `token` for cooperative cancellation instead of the session's own token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops in-flight and future range renders of this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn job(&self) -> &PreparedJob {
        &self.job
    }

    pub fn opts(&self) -> &RenderOpts {
        &self.opts
    }

    /// Sink configuration for rendering `range`.
    pub fn sink_config(&self, range: FrameRange) -> SinkConfig {
        let canvas = self.job.geometry().canvas;
        SinkConfig {
            width: canvas.width,
            height: canvas.height,
            fps: self.job.timing().fps(),
            frames: range.len_frames(),
        }
    }

    /// Render one frame on the calling thread.
    pub fn render_frame(&self, frame: FrameIndex) -> LayerfadeResult<FrameRGBA> {
        Worker::new(&self.job).render(frame)
    }

    /// Render every frame of the job into `sink`.
    pub fn render_all(&self, sink: &mut dyn FrameSink) -> LayerfadeResult<RenderStats> {
        self.render_range(self.job.timing().frame_range(), sink)
    }

    /// Render a frame range and stream frames into a sink.
    ///
    /// The sink receives frames in strictly increasing frame index order. When `parallel` is
    /// enabled, out-of-order worker completion is reordered at the sink boundary (bounded channel
    /// backpressure). The first failing frame aborts the render; its index is in the error.
    #[tracing::instrument(skip(self, sink), fields(start = range.start.0, end = range.end.0))]
    pub fn render_range(
        &self,
        range: FrameRange,
        sink: &mut dyn FrameSink,
    ) -> LayerfadeResult<RenderStats> {
        if range.is_empty() {
            return Err(LayerfadeError::configuration(
                "render range must be non-empty",
            ));
        }
        let total = self.job.timing().total_frames();
        if range.start.0 == 0 || range.end.0 - 1 > total {
            return Err(LayerfadeError::configuration(format!(
                "render range [{}, {}) must lie within [1, {}]",
                range.start.0, range.end.0, total
            )));
        }

        let cfg = self.sink_config(range);
        let cap = self.opts.channel_capacity.max(1);
        let bytes_per_frame = u64::from(cfg.width)
            .saturating_mul(u64::from(cfg.height))
            .saturating_mul(4)
            .max(1);
        let max_chunk_by_mem = (MAX_REORDER_BUFFER_BYTES / bytes_per_frame).max(1);
        let chunk_size = normalized_chunk_size(self.opts.chunk_size)
            .min(max_chunk_by_mem)
            .min(range.len_frames());

        let pool = if self.opts.parallel {
            Some(build_thread_pool(self.opts.threads)?)
        } else {
            None
        };

        // Sink thread: in-order delivery regardless of render completion order.
        let stats = std::thread::scope(|scope| -> LayerfadeResult<RenderStats> {
            let (tx, rx) = mpsc::sync_channel::<FrameMsg>(cap);
            let range_start = range.start.0;
            let range_end = range.end.0;
            let sink_ref: &mut dyn FrameSink = sink;

            let enc = scope.spawn(move || -> LayerfadeResult<()> {
                sink_ref.begin(cfg)?;

                let mut next = range_start;
                let mut pending = HashMap::<u64, Arc<FrameRGBA>>::new();
                while next < range_end {
                    if let Some(frame) = pending.remove(&next) {
                        sink_ref.push_frame(FrameIndex(next), &frame)?;
                        next += 1;
                        continue;
                    }

                    let msg = rx.recv().map_err(|_| {
                        LayerfadeError::render("frame channel disconnected before the last frame")
                    })?;
                    pending.insert(msg.idx.0, msg.frame);
                }

                sink_ref.end()
            });

            let ctx = ChunkCtx {
                job: &self.job,
                cancel: &self.cancel,
                tx: &tx,
            };
            let produce_res = self.produce(&ctx, pool.as_ref(), range, chunk_size);

            drop(tx);
            let enc_res = enc
                .join()
                .map_err(|_| LayerfadeError::render("sink thread panicked"))?;

            match (produce_res, enc_res) {
                (Ok(stats), Ok(())) => Ok(stats),
                // Producers only see a closed channel; the sink knows why it stopped.
                (Err(e), Err(sink_err)) if is_sink_gone(&e) => Err(sink_err),
                (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            }
        });

        match &stats {
            Ok(s) => tracing::info!(
                total = s.frames_total,
                rendered = s.frames_rendered,
                elided = s.frames_elided,
                "rendered range"
            ),
            Err(e) => tracing::warn!(error = %e, frame = ?e.frame(), "render aborted"),
        }
        stats
    }

    fn produce(
        &self,
        ctx: &ChunkCtx<'_>,
        pool: Option<&rayon::ThreadPool>,
        range: FrameRange,
        chunk_size: u64,
    ) -> LayerfadeResult<RenderStats> {
        let mut stats = RenderStats::default();
        let mut chunk_start = range.start.0;
        while chunk_start < range.end.0 {
            let chunk_end = (chunk_start + chunk_size).min(range.end.0);
            ctx.check_cancel(FrameIndex(chunk_start))?;

            let chunk_stats = match pool {
                Some(pool) if self.opts.static_frame_elision => {
                    render_chunk_elided(ctx, pool, chunk_start, chunk_end)?
                }
                Some(pool) => render_chunk_parallel(ctx, pool, chunk_start, chunk_end)?,
                None => render_chunk_sequential(
                    ctx,
                    chunk_start,
                    chunk_end,
                    self.opts.static_frame_elision,
                )?,
            };
            stats.add(chunk_stats);
            chunk_start = chunk_end;
        }
        Ok(stats)
    }
}

const SINK_GONE: &str = "sink thread is not accepting frames";

fn is_sink_gone(e: &LayerfadeError) -> bool {
    matches!(e, LayerfadeError::Render { message, .. } if message == SINK_GONE)
}

#[derive(Debug)]
struct FrameMsg {
    idx: FrameIndex,
    frame: Arc<FrameRGBA>,
}

fn normalized_chunk_size(chunk_size: usize) -> u64 {
    if chunk_size == 0 {
        1
    } else {
        chunk_size as u64
    }
}

fn build_thread_pool(threads: Option<usize>) -> LayerfadeResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("layerfade-{i}"));
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| LayerfadeError::render(format!("failed to build rayon thread pool: {e}")))
}

/// Per-thread render state. Assets are borrowed from the job, never reloaded.
struct Worker<'a> {
    job: &'a PreparedJob,
    scratch: Scratch,
}

impl<'a> Worker<'a> {
    fn new(job: &'a PreparedJob) -> Self {
        Self {
            job,
            scratch: Scratch::default(),
        }
    }

    fn render(&mut self, frame: FrameIndex) -> LayerfadeResult<FrameRGBA> {
        let opacity = self.job.opacity(frame)?;
        self.render_vector(frame, &opacity)
    }

    fn render_vector(
        &mut self,
        frame: FrameIndex,
        opacity: &OpacityVector,
    ) -> LayerfadeResult<FrameRGBA> {
        composite(
            &mut self.scratch,
            opacity,
            self.job.assets(),
            self.job.geometry(),
        )
        .map_err(|e| e.at_frame(frame))
    }
}

#[derive(Clone, Copy)]
struct ChunkCtx<'a> {
    job: &'a PreparedJob,
    cancel: &'a CancelToken,
    tx: &'a mpsc::SyncSender<FrameMsg>,
}

impl ChunkCtx<'_> {
    fn check_cancel(&self, next_frame: FrameIndex) -> LayerfadeResult<()> {
        if self.cancel.is_cancelled() {
            return Err(LayerfadeError::Cancelled { next_frame });
        }
        Ok(())
    }

    fn send(&self, idx: FrameIndex, frame: Arc<FrameRGBA>) -> LayerfadeResult<()> {
        self.tx
            .send(FrameMsg { idx, frame })
            .map_err(|_| LayerfadeError::render_at(idx, SINK_GONE))
    }
}

fn render_chunk_sequential(
    ctx: &ChunkCtx<'_>,
    start: u64,
    end: u64,
    elide: bool,
) -> LayerfadeResult<RenderStats> {
    let mut worker = Worker::new(ctx.job);
    let mut cache = HashMap::<OpacityVector, Arc<FrameRGBA>>::new();
    let mut stats = RenderStats {
        frames_total: end - start,
        ..RenderStats::default()
    };

    for f in (start..end).map(FrameIndex) {
        ctx.check_cancel(f)?;
        let opacity = ctx.job.opacity(f)?;
        if elide && let Some(frame) = cache.get(&opacity) {
            stats.frames_elided += 1;
            ctx.send(f, frame.clone())?;
            continue;
        }

        let frame = Arc::new(worker.render_vector(f, &opacity)?);
        stats.frames_rendered += 1;
        if elide {
            cache.insert(opacity, frame.clone());
        }
        ctx.send(f, frame)?;
    }
    Ok(stats)
}

fn render_chunk_parallel(
    ctx: &ChunkCtx<'_>,
    pool: &rayon::ThreadPool,
    start: u64,
    end: u64,
) -> LayerfadeResult<RenderStats> {
    pool.install(|| {
        (start..end).into_par_iter().try_for_each_init(
            || Worker::new(ctx.job),
            |w, f| -> LayerfadeResult<()> {
                let f = FrameIndex(f);
                ctx.check_cancel(f)?;
                let frame = w.render(f)?;
                ctx.send(f, Arc::new(frame))
            },
        )
    })?;

    let n = end - start;
    Ok(RenderStats {
        frames_total: n,
        frames_rendered: n,
        frames_elided: 0,
    })
}

fn render_chunk_elided(
    ctx: &ChunkCtx<'_>,
    pool: &rayon::ThreadPool,
    start: u64,
    end: u64,
) -> LayerfadeResult<RenderStats> {
    let mut uniq = Vec::<(FrameIndex, OpacityVector)>::new();
    let mut map = Vec::<usize>::with_capacity((end - start) as usize);
    let mut seen = HashMap::<OpacityVector, usize>::new();

    for f in (start..end).map(FrameIndex) {
        let opacity = ctx.job.opacity(f)?;
        let u = match seen.get(&opacity) {
            Some(&u) => u,
            None => {
                let u = uniq.len();
                seen.insert(opacity.clone(), u);
                uniq.push((f, opacity));
                u
            }
        };
        map.push(u);
    }

    let rendered = pool.install(|| {
        uniq.par_iter()
            .enumerate()
            .map_init(
                || Worker::new(ctx.job),
                |w, (i, (f, opacity))| -> LayerfadeResult<(usize, Arc<FrameRGBA>)> {
                    ctx.check_cancel(*f)?;
                    Ok((i, Arc::new(w.render_vector(*f, opacity)?)))
                },
            )
            .collect::<Vec<_>>()
    });

    let mut unique_frames = vec![None::<Arc<FrameRGBA>>; uniq.len()];
    for r in rendered {
        let (i, frame) = r?;
        unique_frames[i] = Some(frame);
    }
    let unique_frames = unique_frames
        .into_iter()
        .map(|x| x.ok_or_else(|| LayerfadeError::render("missing unique rendered frame")))
        .collect::<LayerfadeResult<Vec<_>>>()?;

    for (f, &u) in (start..end).map(FrameIndex).zip(&map) {
        ctx.send(f, unique_frames[u].clone())?;
    }

    let total = end - start;
    let rendered_count = unique_frames.len() as u64;
    Ok(RenderStats {
        frames_total: total,
        frames_rendered: rendered_count,
        frames_elided: total.saturating_sub(rendered_count),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/session.rs"]
mod tests;
