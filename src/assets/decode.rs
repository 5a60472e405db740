use std::path::Path;

use anyhow::Context;

use crate::assets::bitmap::Bitmap;
use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// Decode an encoded image (PNG, JPEG, ...) into straight RGBA8.
pub fn decode_image(bytes: &[u8]) -> LayerfadeResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::from_rgba8(Size::new(width, height), rgba.into_raw())
}

/// Read and decode the image at `path`.
///
/// Every failure is reported as an asset error naming `path`.
pub fn load_image(path: &Path) -> LayerfadeResult<Bitmap> {
    let bytes = std::fs::read(path)
        .map_err(|e| LayerfadeError::asset(path, format!("read failed: {e}")))?;
    decode_image(&bytes).map_err(|e| match e {
        LayerfadeError::Asset { message, .. } => LayerfadeError::asset(path, message),
        other => LayerfadeError::asset(path, format!("{other:#}")),
    })
}

/// Read only the image header to get its dimensions.
pub fn read_size(path: &Path) -> LayerfadeResult<Size> {
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| LayerfadeError::asset(path, format!("failed to read dimensions: {e}")))?;
    let size = Size::new(width, height);
    if size.is_empty() {
        return Err(LayerfadeError::asset(
            path,
            format!("degenerate image dimensions {size}"),
        ));
    }
    Ok(size)
}
