use super::*;
use crate::assets::bitmap::Bitmap;
use crate::assets::store::{Layer, PreparedAssets};
use crate::encode::sink::InMemorySink;
use crate::foundation::core::{Fps, Size};
use crate::render::geometry::OverlayFit;
use crate::timing::config::TimingConfig;

fn gradient(w: u32, h: u32, seed: u8, alpha: u8) -> Bitmap {
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            data.extend_from_slice(&[
                seed.wrapping_add((x * 40) as u8),
                seed.wrapping_mul(3).wrapping_add((y * 60) as u8),
                (x * y * 17) as u8,
                alpha.saturating_sub(((x + y) * 20) as u8),
            ]);
        }
    }
    Bitmap::from_rgba8(Size::new(w, h), data).unwrap()
}

fn job(overlay: bool) -> Arc<PreparedJob> {
    let assets = PreparedAssets::from_parts(
        gradient(4, 4, 10, 255),
        vec![
            Layer::new("a", gradient(4, 4, 90, 230)),
            Layer::new("b", gradient(4, 4, 170, 180)),
        ],
        overlay.then(|| gradient(6, 6, 5, 120)),
        Layer::new("outro", gradient(4, 4, 200, 255)),
    )
    .unwrap();
    let timing = TimingConfig::new(4, 2, 2, 3, Fps::integer(30).unwrap()).unwrap();
    Arc::new(PreparedJob::from_parts(assets, timing, OverlayFit::Drop).unwrap())
}

fn opts(parallel: bool, elision: bool) -> RenderOpts {
    RenderOpts {
        parallel,
        chunk_size: 5,
        threads: parallel.then_some(3),
        static_frame_elision: elision,
        channel_capacity: 2,
    }
}

fn render(job: Arc<PreparedJob>, opts: RenderOpts) -> (RenderStats, InMemorySink) {
    let session = RenderSession::new(job, opts).unwrap();
    let mut sink = InMemorySink::new();
    let stats = session.render_all(&mut sink).unwrap();
    (stats, sink)
}

#[test]
fn parallel_render_is_ordered_and_complete() {
    let (stats, sink) = render(job(true), opts(true, false));
    assert_eq!(
        stats,
        RenderStats {
            frames_total: 17,
            frames_rendered: 17,
            frames_elided: 0,
        }
    );
    assert!(sink.is_finished());
    assert_eq!(sink.config().unwrap().width, 6);
    let idx: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(idx, (1..=17).collect::<Vec<_>>());
    assert_ne!(sink.frames()[1].1.data, sink.frames()[2].1.data);
}

#[test]
fn parallel_matches_sequential_output() {
    for overlay in [false, true] {
        let (_, seq) = render(job(overlay), RenderOpts::sequential());
        for (p, e) in [(true, false), (true, true), (false, true)] {
            let (_, other) = render(job(overlay), opts(p, e));
            assert_eq!(seq.frames(), other.frames(), "parallel={p} elision={e}");
        }
    }
}

#[test]
fn elision_renders_each_distinct_vector_once_per_chunk() {
    let (stats, sink) = render(job(false), opts(true, true));
    assert_eq!(stats.frames_total, 17);
    assert_eq!(stats.frames_rendered + stats.frames_elided, 17);
    assert!(stats.frames_elided > 0);

    // Frames 5 and 6 both hold layer 0 at 255 with layer 1 not started.
    assert_eq!(sink.frames()[4].1, sink.frames()[5].1);
}

#[test]
fn render_frame_matches_range_output() {
    let job = job(true);
    let session = RenderSession::new(job.clone(), RenderOpts::default()).unwrap();
    let (_, sink) = render(job, RenderOpts::sequential());
    for f in [1u64, 7, 14, 17] {
        let frame = session.render_frame(FrameIndex(f)).unwrap();
        assert_eq!(frame, sink.frames()[(f - 1) as usize].1);
    }
}

#[test]
fn out_of_range_frame_reports_its_index() {
    let session = RenderSession::new(job(false), RenderOpts::default()).unwrap();
    let err = session.render_frame(FrameIndex(18)).unwrap_err();
    assert_eq!(err.frame(), Some(FrameIndex(18)));
}

#[test]
fn ranges_outside_the_job_are_rejected() {
    let session = RenderSession::new(job(false), RenderOpts::default()).unwrap();
    let mut sink = InMemorySink::new();
    let too_long = FrameRange::new(FrameIndex(1), FrameIndex(19)).unwrap();
    assert!(matches!(
        session.render_range(too_long, &mut sink).unwrap_err(),
        LayerfadeError::Configuration(_)
    ));
    let empty = FrameRange::new(FrameIndex(3), FrameIndex(3)).unwrap();
    assert!(session.render_range(empty, &mut sink).is_err());
}

#[test]
fn partial_range_starts_at_its_first_frame() {
    let session = RenderSession::new(job(false), opts(true, true)).unwrap();
    let mut sink = InMemorySink::new();
    let range = FrameRange::new(FrameIndex(10), FrameIndex(16)).unwrap();
    let stats = session.render_range(range, &mut sink).unwrap();
    assert_eq!(stats.frames_total, 6);
    assert_eq!(sink.frames().first().unwrap().0, FrameIndex(10));
    assert_eq!(sink.frames().last().unwrap().0, FrameIndex(15));
}

#[test]
fn zero_threads_is_a_configuration_error() {
    let mut o = opts(true, false);
    o.threads = Some(0);
    assert!(matches!(
        RenderSession::new(job(false), o).err().unwrap(),
        LayerfadeError::Configuration(_)
    ));
}

#[test]
fn cancelled_before_start_renders_nothing() {
    let session = RenderSession::new(job(false), opts(true, false)).unwrap();
    session.cancel_token().cancel();
    let mut sink = InMemorySink::new();
    let err = session.render_all(&mut sink).unwrap_err();
    assert!(matches!(
        err,
        LayerfadeError::Cancelled {
            next_frame: FrameIndex(1)
        }
    ));
    assert!(sink.frames().is_empty());
}

struct CancellingSink {
    inner: InMemorySink,
    token: CancelToken,
    at: FrameIndex,
}

impl FrameSink for CancellingSink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerfadeResult<()> {
        self.inner.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> LayerfadeResult<()> {
        if idx == self.at {
            self.token.cancel();
        }
        self.inner.push_frame(idx, frame)
    }

    fn end(&mut self) -> LayerfadeResult<()> {
        self.inner.end()
    }
}

#[test]
fn cancellation_stops_dispatch() {
    let token = CancelToken::new();
    let mut o = RenderOpts::sequential();
    o.chunk_size = 1;
    o.channel_capacity = 1;
    let session = RenderSession::new(job(false), o)
        .unwrap()
        .with_cancel_token(token.clone());

    let mut sink = CancellingSink {
        inner: InMemorySink::new(),
        token,
        at: FrameIndex(2),
    };
    let err = session.render_all(&mut sink).unwrap_err();
    assert!(matches!(err, LayerfadeError::Cancelled { .. }));
    assert!(sink.inner.frames().len() < 17);
    assert!(!sink.inner.is_finished());
}

struct FailingSink {
    fail_at: FrameIndex,
}

impl FrameSink for FailingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> LayerfadeResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &FrameRGBA) -> LayerfadeResult<()> {
        if idx == self.fail_at {
            return Err(LayerfadeError::encode("disk full"));
        }
        Ok(())
    }

    fn end(&mut self) -> LayerfadeResult<()> {
        Ok(())
    }
}

#[test]
fn sink_failures_are_not_masked_by_the_closed_channel() {
    for o in [opts(true, false), opts(true, true), RenderOpts::sequential()] {
        let session = RenderSession::new(job(false), o).unwrap();
        let err = session
            .render_all(&mut FailingSink {
                fail_at: FrameIndex(3),
            })
            .unwrap_err();
        assert!(
            matches!(&err, LayerfadeError::Encode(m) if m == "disk full"),
            "got {err:?}"
        );
    }
}
