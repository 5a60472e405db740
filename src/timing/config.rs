use crate::foundation::core::{FrameIndex, FrameRange, Fps};
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::timing::opacity::{FramePhase, OpacityVector, opacity_vector, outro_opacity};

/// A duration given either as a frame count or in seconds.
///
/// Seconds are converted with floor semantics against the job framerate.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Span {
    Frames(u64),
    Seconds(f64),
}

impl Span {
    pub fn to_frames(self, fps: Fps) -> LayerfadeResult<u64> {
        match self {
            Span::Frames(n) => Ok(n),
            Span::Seconds(s) => {
                if !s.is_finite() || s < 0.0 {
                    return Err(LayerfadeError::configuration(format!(
                        "duration in seconds must be finite and >= 0, got {s}"
                    )));
                }
                Ok(fps.secs_to_frames_floor(s))
            }
        }
    }
}

/// Boundary form of the timing parameters, as found in job descriptions.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingSpec {
    /// Fade-in duration of each layer.
    pub fade: Span,
    /// Hold duration after each fade, and once more after the last layer.
    pub still: Span,
    /// Outro fade duration. Defaults to `fade`.
    #[serde(default)]
    pub outro_fade: Option<Span>,
    /// Output framerate.
    pub fps: Fps,
}

impl TimingSpec {
    /// Normalize to integer frame counts and validate for `layer_count` layers.
    pub fn to_config(&self, layer_count: usize) -> LayerfadeResult<TimingConfig> {
        let fade_frames = self.fade.to_frames(self.fps)?;
        let still_frames = self.still.to_frames(self.fps)?;
        let outro_fade_frames = match self.outro_fade {
            Some(span) => span.to_frames(self.fps)?,
            None => fade_frames,
        };
        TimingConfig::new(
            fade_frames,
            still_frames,
            layer_count,
            outro_fade_frames,
            self.fps,
        )
    }
}

/// Validated, immutable timing of a job, in frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    fade_frames: u64,
    still_frames: u64,
    layer_count: usize,
    outro_fade_frames: u64,
    fps: Fps,
    main_frames: u64,
    total_frames: u64,
}

impl TimingConfig {
    pub fn new(
        fade_frames: u64,
        still_frames: u64,
        layer_count: usize,
        outro_fade_frames: u64,
        fps: Fps,
    ) -> LayerfadeResult<Self> {
        if fade_frames == 0 {
            return Err(LayerfadeError::configuration("fade_frames must be > 0"));
        }
        if layer_count == 0 {
            return Err(LayerfadeError::configuration("layer_count must be > 0"));
        }
        Fps::new(fps.num, fps.den)?;

        let overflow = || LayerfadeError::configuration("total frame count overflows u64");
        let cycle = fade_frames.checked_add(still_frames).ok_or_else(overflow)?;
        let main_frames = cycle
            .checked_mul(layer_count as u64)
            .and_then(|v| v.checked_add(still_frames))
            .ok_or_else(overflow)?;
        let total_frames = main_frames
            .checked_add(outro_fade_frames)
            .ok_or_else(overflow)?;
        // Ranges are half-open, so `total_frames + 1` must still fit.
        if total_frames == u64::MAX {
            return Err(overflow());
        }

        Ok(Self {
            fade_frames,
            still_frames,
            layer_count,
            outro_fade_frames,
            fps,
            main_frames,
            total_frames,
        })
    }

    pub fn fade_frames(&self) -> u64 {
        self.fade_frames
    }

    pub fn still_frames(&self) -> u64 {
        self.still_frames
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    pub fn outro_fade_frames(&self) -> u64 {
        self.outro_fade_frames
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Frames occupied by one layer: its fade plus its hold.
    pub fn cycle_length(&self) -> u64 {
        self.fade_frames + self.still_frames
    }

    /// Frames of the layer sequence, including the final hold after the last layer.
    pub fn main_frames(&self) -> u64 {
        self.main_frames
    }

    /// `cycle_length * layer_count + still_frames + outro_fade_frames`.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn frame_range(&self) -> FrameRange {
        FrameRange::all(self.total_frames)
    }

    /// Output index of outro step `step` (1-based).
    pub fn outro_frame_index(&self, step: u64) -> FrameIndex {
        FrameIndex(self.main_frames + step)
    }

    /// Classify `frame` as part of the layer sequence or the outro.
    pub fn phase(&self, frame: FrameIndex) -> LayerfadeResult<FramePhase> {
        self.check_frame(frame)?;
        if frame.0 <= self.main_frames {
            let zero = frame.0 - 1;
            let cycle = self.cycle_length();
            Ok(FramePhase::Main {
                layer: zero / cycle,
                phase: zero % cycle,
            })
        } else {
            Ok(FramePhase::Outro {
                step: frame.0 - self.main_frames,
            })
        }
    }

    /// Opacity of every layer and of the outro at `frame`.
    pub fn opacity(&self, frame: FrameIndex) -> LayerfadeResult<OpacityVector> {
        match self.phase(frame)? {
            FramePhase::Main { .. } => Ok(opacity_vector(
                frame,
                self.cycle_length(),
                self.fade_frames,
                self.layer_count,
            )),
            FramePhase::Outro { step } => Ok(OpacityVector::outro(
                self.layer_count,
                outro_opacity(step, self.outro_fade_frames),
            )),
        }
    }

    fn check_frame(&self, frame: FrameIndex) -> LayerfadeResult<()> {
        if frame.0 == 0 || frame.0 > self.total_frames {
            return Err(LayerfadeError::render_at(
                frame,
                format!(
                    "frame index out of range [1, {}] for this job",
                    self.total_frames
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timing/config.rs"]
mod tests;
