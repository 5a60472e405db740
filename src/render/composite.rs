use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::foundation::math::shift_div255;

/// Straight (non-premultiplied) RGBA8 pixel.
pub type Rgba8 = [u8; 4];

const PRECISION_BITS: u32 = 7;

/// Straight-alpha "over": `src` on top of `dst`.
///
/// Integer arithmetic with seven extra precision bits and shift-based division by 255, matching
/// the raster library existing reference renders were produced with, bit for bit.
#[inline]
pub fn over(dst: Rgba8, src: Rgba8) -> Rgba8 {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return dst;
    }

    let blend = u32::from(dst[3]) * (255 - sa);
    let outa255 = sa * 255 + blend;
    let coef1 = sa * 255 * 255 * (1 << PRECISION_BITS) / outa255;
    let coef2 = 255 * (1 << PRECISION_BITS) - coef1;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let tmp = u32::from(src[i]) * coef1 + u32::from(dst[i]) * coef2;
        out[i] = (shift_div255(tmp + (0x80 << PRECISION_BITS)) >> PRECISION_BITS) as u8;
    }
    out[3] = shift_div255(outa255 + 0x80) as u8;
    out
}

/// `over` for whole rgba8 buffers of equal length.
pub fn over_in_place(dst: &mut [u8], src: &[u8]) -> LayerfadeResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(LayerfadeError::render(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&out);
    }
    Ok(())
}

/// A source image to composite with its alpha replaced by `min(mask, opacity)`.
#[derive(Clone, Copy, Debug)]
pub struct ClampedSource<'a> {
    pub size: Size,
    pub rgba: &'a [u8],
    pub mask: &'a [u8],
    pub opacity: u8,
}

impl ClampedSource<'_> {
    fn check(&self) -> LayerfadeResult<()> {
        let len = self.size.rgba_len()?;
        if self.rgba.len() != len || self.mask.len() * 4 != len {
            return Err(LayerfadeError::render(format!(
                "clamped source buffers do not match {}",
                self.size
            )));
        }
        Ok(())
    }
}

/// Composite `src` over the region of `dst` whose top-left corner is `offset`.
///
/// Every source pixel's alpha is clamped to `min(mask, opacity)` first. Opacity 0 leaves `dst`
/// untouched.
pub fn over_clamped_at(
    dst: &mut [u8],
    dst_size: Size,
    src: ClampedSource<'_>,
    offset: (u32, u32),
) -> LayerfadeResult<()> {
    src.check()?;
    check_region(dst, dst_size, src.size, offset)?;
    if src.opacity == 0 {
        return Ok(());
    }

    let dst_stride = dst_size.width as usize * 4;
    let src_stride = src.size.width as usize * 4;
    let w = src.size.width as usize;
    for y in 0..src.size.height as usize {
        let d_start = (y + offset.1 as usize) * dst_stride + offset.0 as usize * 4;
        let d_row = &mut dst[d_start..d_start + src_stride];
        let s_row = &src.rgba[y * src_stride..(y + 1) * src_stride];
        let m_row = &src.mask[y * w..(y + 1) * w];

        for ((d, s), &m) in d_row
            .chunks_exact_mut(4)
            .zip(s_row.chunks_exact(4))
            .zip(m_row)
        {
            let a = m.min(src.opacity);
            let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], a]);
            d.copy_from_slice(&out);
        }
    }
    Ok(())
}

/// Copy `src` verbatim into `dst` at `offset`, replacing what was there.
pub fn blit(
    dst: &mut [u8],
    dst_size: Size,
    src: &[u8],
    src_size: Size,
    offset: (u32, u32),
) -> LayerfadeResult<()> {
    if src.len() != src_size.rgba_len()? {
        return Err(LayerfadeError::render(format!(
            "blit source buffer does not match {src_size}"
        )));
    }
    check_region(dst, dst_size, src_size, offset)?;

    let dst_stride = dst_size.width as usize * 4;
    let src_stride = src_size.width as usize * 4;
    for (y, s_row) in src.chunks_exact(src_stride).enumerate() {
        let d_start = (y + offset.1 as usize) * dst_stride + offset.0 as usize * 4;
        dst[d_start..d_start + src_stride].copy_from_slice(s_row);
    }
    Ok(())
}

fn check_region(
    dst: &[u8],
    dst_size: Size,
    src_size: Size,
    offset: (u32, u32),
) -> LayerfadeResult<()> {
    if dst.len() != dst_size.rgba_len()? {
        return Err(LayerfadeError::render(format!(
            "destination buffer does not match {dst_size}"
        )));
    }
    let fits_x = offset
        .0
        .checked_add(src_size.width)
        .is_some_and(|r| r <= dst_size.width);
    let fits_y = offset
        .1
        .checked_add(src_size.height)
        .is_some_and(|b| b <= dst_size.height);
    if !fits_x || !fits_y {
        return Err(LayerfadeError::render(format!(
            "{src_size} at ({}, {}) does not fit in {dst_size}",
            offset.0, offset.1
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
