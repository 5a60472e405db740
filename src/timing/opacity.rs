use smallvec::SmallVec;

use crate::foundation::core::FrameIndex;
use crate::foundation::math::{ramp_floor_u8, ramp_round_u8};

/// Fully opaque.
pub const OPAQUE: u8 = 255;

/// Where a frame index falls in the animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    /// Layer sequence. `layer` is the layer currently fading or held (`layer_count` during the
    /// final hold); `phase` is the offset inside its cycle.
    Main { layer: u64, phase: u64 },
    /// Outro fade, `step` in `[1, outro_fade_frames]`.
    Outro { step: u64 },
}

/// Per-frame opacities: one per layer plus the outro.
///
/// Only the first `visible` layers take part in compositing. Later layers have not started
/// fading yet and are stored as 0.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OpacityVector {
    layers: SmallVec<[u8; 16]>,
    visible: usize,
    outro: Option<u8>,
}

impl OpacityVector {
    pub(crate) fn outro(layer_count: usize, opacity: u8) -> Self {
        Self {
            layers: SmallVec::from_elem(0, layer_count),
            visible: 0,
            outro: Some(opacity),
        }
    }

    /// Opacity of every layer, in layer order.
    pub fn layers(&self) -> &[u8] {
        &self.layers
    }

    /// Opacities of the layers that are composited for this frame.
    pub fn visible_layers(&self) -> &[u8] {
        &self.layers[..self.visible]
    }

    /// Opacity of layer `i`, `None` when it is not composited at all.
    pub fn layer(&self, i: usize) -> Option<u8> {
        (i < self.visible).then(|| self.layers[i])
    }

    /// Outro opacity; `None` for frames of the layer sequence.
    pub fn outro_opacity(&self) -> Option<u8> {
        self.outro
    }

    pub fn is_outro(&self) -> bool {
        self.outro.is_some()
    }
}

/// Layer opacities at `frame` (1-based) for the layer sequence.
///
/// Layers before the current one are opaque; the current one ramps linearly from 0 with
/// truncating division and snaps to 255 once its fade is over; later layers are not visible.
/// The ramp never reaches 255 inside the fade itself (`phase = fade_frames - 1` gives
/// `255 * (fade_frames - 1) / fade_frames`); existing reference renders depend on this.
///
/// `cycle_length` and `fade_frames` must be non-zero; [`crate::TimingConfig`] guarantees it.
pub fn opacity_vector(
    frame: FrameIndex,
    cycle_length: u64,
    fade_frames: u64,
    layer_count: usize,
) -> OpacityVector {
    let zero = frame.0.saturating_sub(1);
    let k = zero / cycle_length;
    let phase = zero % cycle_length;

    let mut layers = SmallVec::<[u8; 16]>::from_elem(0, layer_count);
    let visible = usize::try_from(k)
        .map(|k| k.saturating_add(1).min(layer_count))
        .unwrap_or(layer_count);

    for (i, slot) in layers.iter_mut().enumerate().take(visible) {
        let i = i as u64;
        *slot = if i < k || phase >= fade_frames {
            OPAQUE
        } else {
            ramp_floor_u8(phase, fade_frames)
        };
    }

    OpacityVector {
        layers,
        visible,
        outro: None,
    }
}

/// Outro opacity at outro step `step` in `[1, outro_fade_frames]`.
///
/// Rounds to nearest (halves up) and reaches 255 on the last step.
pub fn outro_opacity(step: u64, outro_fade_frames: u64) -> u8 {
    if outro_fade_frames == 0 || step >= outro_fade_frames {
        return OPAQUE;
    }
    ramp_round_u8(step, outro_fade_frames)
}

#[cfg(test)]
#[path = "../../tests/unit/timing/opacity.rs"]
mod tests;
