use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::render::frame::FrameRGBA;

/// Configuration provided to a [`FrameSink`] at the start of a range render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frames-per-second.
    pub fps: Fps,
    /// Number of frames that will be pushed.
    pub frames: u64,
}

/// Sink contract for consuming rendered frames in output order.
///
/// Ordering contract: `push_frame` is called in strictly increasing `FrameIndex` order within the
/// requested render range.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> LayerfadeResult<()>;
    /// Push one frame in strictly increasing frame order.
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> LayerfadeResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> LayerfadeResult<()>;
}

/// Rejects frames that are not strictly after the previous one or do not match the configured
/// size.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct OrderGuard {
    last: Option<FrameIndex>,
}

impl OrderGuard {
    pub(crate) fn reset(&mut self) {
        self.last = None;
    }

    pub(crate) fn accept(
        &mut self,
        sink: &str,
        cfg: Option<&SinkConfig>,
        idx: FrameIndex,
        frame: &FrameRGBA,
    ) -> LayerfadeResult<SinkConfig> {
        let cfg = cfg
            .copied()
            .ok_or_else(|| LayerfadeError::encode(format!("{sink} sink not started")))?;
        if let Some(last) = self.last
            && idx.0 <= last.0
        {
            return Err(LayerfadeError::encode(format!(
                "{sink} sink received out-of-order frame {} after {}",
                idx.0, last.0
            )));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(LayerfadeError::encode(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        self.last = Some(idx);
        Ok(cfg)
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    guard: OrderGuard,
    ended: bool,
    /// Frames in output order.
    pub(crate) frames: Vec<(FrameIndex, FrameRGBA)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sink configuration captured in `begin`, if any.
    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Borrow the captured frames.
    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    /// `true` once `end` has been called.
    pub fn is_finished(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerfadeResult<()> {
        self.cfg = Some(cfg);
        self.guard.reset();
        self.ended = false;
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> LayerfadeResult<()> {
        self.guard.accept("in-memory", self.cfg.as_ref(), idx, frame)?;
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> LayerfadeResult<()> {
        self.ended = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/sink.rs"]
mod tests;
