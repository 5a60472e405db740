//! Raster backend: turns an opacity vector into pixels.

use crate::assets::bitmap::Bitmap;
use crate::assets::store::{Layer, PreparedAssets};
use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::render::composite::{ClampedSource, blit, over_clamped_at, over_in_place};
use crate::render::frame::FrameRGBA;
use crate::render::geometry::CanvasGeometry;
use crate::timing::opacity::OpacityVector;

/// Per-worker buffers reused from one frame to the next.
#[derive(Debug, Default)]
pub struct Scratch {
    content: Vec<u8>,
}

/// Compose one frame of the layer sequence.
///
/// The background is copied, every visible layer is composited on top in order with its alpha
/// clamped to the layer opacity, the result is placed on a transparent canvas at the geometry
/// offset and the overlay (if any) goes on top. Layers that are not visible are never read.
pub fn composite_frame(
    opacity: &OpacityVector,
    layers: &[Layer],
    background: &Bitmap,
    overlay: Option<&Bitmap>,
    geometry: &CanvasGeometry,
) -> LayerfadeResult<FrameRGBA> {
    composite_frame_with(
        &mut Scratch::default(),
        opacity,
        layers,
        background,
        overlay,
        geometry,
    )
}

/// [`composite_frame`] reusing `scratch` for the intermediate content buffer.
pub fn composite_frame_with(
    scratch: &mut Scratch,
    opacity: &OpacityVector,
    layers: &[Layer],
    background: &Bitmap,
    overlay: Option<&Bitmap>,
    geometry: &CanvasGeometry,
) -> LayerfadeResult<FrameRGBA> {
    if opacity.is_outro() {
        return Err(LayerfadeError::render(
            "outro opacity passed to the layer compositor",
        ));
    }
    if opacity.layers().len() != layers.len() {
        return Err(LayerfadeError::render(format!(
            "opacity vector has {} entries for {} layers",
            opacity.layers().len(),
            layers.len()
        )));
    }
    check_content(background.size(), geometry)?;

    let content = geometry.content;
    let work = &mut scratch.content;
    work.clear();
    work.extend_from_slice(background.data());
    for (layer, &op) in layers.iter().zip(opacity.visible_layers()) {
        over_clamped_at(work, content, clamped(layer, op), (0, 0))?;
    }

    let mut frame = FrameRGBA::transparent(geometry.canvas)?;
    blit(&mut frame.data, geometry.canvas, work, content, geometry.offset)?;
    apply_overlay(&mut frame, overlay, geometry)?;
    Ok(frame)
}

/// Compose one outro frame: the outro image with its alpha clamped to `opacity`, on a transparent
/// canvas at the geometry offset, overlay on top.
pub fn composite_outro(
    opacity: u8,
    outro: &Layer,
    overlay: Option<&Bitmap>,
    geometry: &CanvasGeometry,
) -> LayerfadeResult<FrameRGBA> {
    check_content(outro.bitmap.size(), geometry)?;

    let mut frame = FrameRGBA::transparent(geometry.canvas)?;
    over_clamped_at(
        &mut frame.data,
        geometry.canvas,
        clamped(outro, opacity),
        geometry.offset,
    )?;
    apply_overlay(&mut frame, overlay, geometry)?;
    Ok(frame)
}

/// Dispatch on the vector kind: layer sequence or outro.
pub fn composite(
    scratch: &mut Scratch,
    opacity: &OpacityVector,
    assets: &PreparedAssets,
    geometry: &CanvasGeometry,
) -> LayerfadeResult<FrameRGBA> {
    let overlay = if geometry.overlay {
        assets.overlay()
    } else {
        None
    };
    match opacity.outro_opacity() {
        Some(op) => composite_outro(op, assets.outro(), overlay, geometry),
        None => composite_frame_with(
            scratch,
            opacity,
            assets.layers(),
            assets.background(),
            overlay,
            geometry,
        ),
    }
}

fn clamped(layer: &Layer, opacity: u8) -> ClampedSource<'_> {
    ClampedSource {
        size: layer.bitmap.size(),
        rgba: layer.bitmap.data(),
        mask: layer.mask.data(),
        opacity,
    }
}

fn check_content(got: Size, geometry: &CanvasGeometry) -> LayerfadeResult<()> {
    if got != geometry.content {
        return Err(LayerfadeError::render(format!(
            "content is {got} but the geometry expects {}",
            geometry.content
        )));
    }
    Ok(())
}

fn apply_overlay(
    frame: &mut FrameRGBA,
    overlay: Option<&Bitmap>,
    geometry: &CanvasGeometry,
) -> LayerfadeResult<()> {
    let Some(overlay) = overlay.filter(|_| geometry.overlay) else {
        return Ok(());
    };
    if overlay.size() != geometry.canvas {
        return Err(LayerfadeError::render(format!(
            "overlay is {} but the canvas is {}",
            overlay.size(),
            geometry.canvas
        )));
    }
    over_in_place(&mut frame.data, overlay.data())
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
