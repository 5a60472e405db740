use std::sync::Arc;

use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// Decoded raster in straight (non-premultiplied) RGBA8, row-major, tightly packed.
///
/// Pixel data sits behind an `Arc`: clones share the same buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    size: Size,
    data: Arc<Vec<u8>>,
}

/// Path reported for bitmaps that were built in memory rather than read from a file.
pub const IN_MEMORY: &str = "<in-memory>";

impl Bitmap {
    /// Wrap tightly packed rgba8 pixels.
    ///
    /// Zero dimensions or a length mismatch are asset errors against [`IN_MEMORY`]; file loaders
    /// replace the path with the real one.
    pub fn from_rgba8(size: Size, data: Vec<u8>) -> LayerfadeResult<Self> {
        if size.is_empty() {
            return Err(LayerfadeError::asset(
                IN_MEMORY,
                format!("bitmap dimensions must be non-zero, got {size}"),
            ));
        }
        if data.len() != size.rgba_len()? {
            return Err(LayerfadeError::asset(
                IN_MEMORY,
                format!("bitmap data length {} does not match {size} rgba8", data.len()),
            ));
        }
        Ok(Self {
            size,
            data: Arc::new(data),
        })
    }

    /// Solid-colour bitmap, mostly useful for tests and fixtures.
    pub fn filled(size: Size, rgba: [u8; 4]) -> LayerfadeResult<Self> {
        let len = size.rgba_len()?;
        let data = rgba.iter().copied().cycle().take(len).collect();
        Self::from_rgba8(size, data)
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Single-channel alpha plane extracted once from a [`Bitmap`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    data: Arc<Vec<u8>>,
}

impl AlphaMask {
    pub fn extract(bitmap: &Bitmap) -> Self {
        let data = bitmap.data().chunks_exact(4).map(|px| px[3]).collect();
        Self {
            data: Arc::new(data),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
