use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// What to do with an overlay that is smaller than the content in some axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayFit {
    /// Render without the overlay; canvas = content size.
    #[default]
    Drop,
    /// Refuse the job with a geometry error.
    Strict,
}

/// Output canvas size and where the content rectangle sits inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct CanvasGeometry {
    pub canvas: Size,
    pub content: Size,
    /// Top-left corner of the content inside the canvas.
    pub offset: (u32, u32),
    /// `false` when there is no overlay or it was dropped for being too small.
    pub overlay: bool,
}

impl CanvasGeometry {
    /// Geometry without an overlay: the canvas is the content.
    pub fn content_only(content: Size) -> Self {
        Self {
            canvas: content,
            content,
            offset: (0, 0),
            overlay: false,
        }
    }
}

/// Compute the canvas for `content` framed by an optional overlay.
///
/// The overlay defines the canvas and the content is centered in it (floor division). An overlay
/// smaller than the content in either axis is handled according to `fit`.
pub fn compute_geometry(
    content: Size,
    overlay: Option<Size>,
    fit: OverlayFit,
) -> LayerfadeResult<CanvasGeometry> {
    if content.is_empty() {
        return Err(LayerfadeError::geometry(format!(
            "content dimensions must be non-zero, got {content}"
        )));
    }
    content.rgba_len()?;

    let Some(overlay) = overlay else {
        return Ok(CanvasGeometry::content_only(content));
    };
    if overlay.is_empty() {
        return Err(LayerfadeError::geometry(format!(
            "overlay dimensions must be non-zero, got {overlay}"
        )));
    }

    if !overlay.contains(content) {
        return match fit {
            OverlayFit::Drop => {
                tracing::warn!(
                    %overlay,
                    %content,
                    "overlay is smaller than the content; rendering without it"
                );
                Ok(CanvasGeometry::content_only(content))
            }
            OverlayFit::Strict => Err(LayerfadeError::geometry(format!(
                "overlay {overlay} is smaller than content {content}"
            ))),
        };
    }
    overlay.rgba_len()?;

    Ok(CanvasGeometry {
        canvas: overlay,
        content,
        offset: (
            (overlay.width - content.width) / 2,
            (overlay.height - content.height) / 2,
        ),
        overlay: true,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/geometry.rs"]
mod tests;
