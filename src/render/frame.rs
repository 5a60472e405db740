use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// One rendered output frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Straight RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

impl FrameRGBA {
    /// Fully transparent frame.
    pub fn transparent(size: Size) -> LayerfadeResult<Self> {
        Ok(Self {
            width: size.width,
            height: size.height,
            data: vec![0; size.rgba_len()?],
        })
    }

    pub fn from_rgba8(size: Size, data: Vec<u8>) -> LayerfadeResult<Self> {
        if data.len() != size.rgba_len()? {
            return Err(LayerfadeError::render(format!(
                "frame data length {} does not match {size} rgba8",
                data.len()
            )));
        }
        Ok(Self {
            width: size.width,
            height: size.height,
            data,
        })
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// RGBA value at `(x, y)`, `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ])
    }

    /// Hand the buffer to the `image` crate, e.g. for PNG output.
    pub fn to_image(&self) -> LayerfadeResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone()).ok_or_else(|| {
            LayerfadeError::render(format!(
                "frame buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}
