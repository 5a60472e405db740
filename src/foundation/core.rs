use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// 1-based frame index in final output order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// First frame of every job.
    pub const FIRST: FrameIndex = FrameIndex(1);
}

/// Half-open frame range `[start, end)` over 1-based frame indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex,
}

impl FrameRange {
    /// Create a validated range with `1 <= start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> LayerfadeResult<Self> {
        if start.0 == 0 {
            return Err(LayerfadeError::configuration(
                "FrameRange start must be >= 1 (frame indices are 1-based)",
            ));
        }
        if start.0 > end.0 {
            return Err(LayerfadeError::configuration(
                "FrameRange start must be <= end",
            ));
        }
        Ok(Self { start, end })
    }

    /// Every frame of a job with `total` frames: `[1, total]`.
    ///
    /// `total` is capped at `u64::MAX - 1` so the exclusive end stays representable.
    pub fn all(total: u64) -> Self {
        Self {
            start: FrameIndex::FIRST,
            end: FrameIndex(total.saturating_add(1)),
        }
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    pub fn is_empty(self) -> bool {
        self.start.0 >= self.end.0
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    pub fn new(num: u32, den: u32) -> LayerfadeResult<Self> {
        if den == 0 {
            return Err(LayerfadeError::configuration("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(LayerfadeError::configuration("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Integer framerate.
    pub fn integer(num: u32) -> LayerfadeResult<Self> {
        Self::new(num, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * f64::from(self.den) / f64::from(self.num)
    }

    /// Convert seconds to a frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }
}

/// Pixel dimensions of an image or canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte length of a tightly packed RGBA8 buffer of this size.
    pub fn rgba_len(self) -> LayerfadeResult<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or_else(|| {
                LayerfadeError::geometry(format!(
                    "{}x{} rgba buffer size overflows",
                    self.width, self.height
                ))
            })
    }

    /// `true` when `other` fits inside `self` in both axes.
    pub fn contains(self, other: Size) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
