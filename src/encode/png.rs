use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::sink::{FrameSink, OrderGuard, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::render::frame::FrameRGBA;

/// `printf`-style pattern matching [`frame_file_name`], for encoders reading the sequence back.
pub const FRAME_PATTERN: &str = "frame_%05d.png";

/// File name of frame `idx` in a PNG sequence: `frame_00001.png` for the first frame.
pub fn frame_file_name(idx: FrameIndex) -> String {
    format!("frame_{:05}.png", idx.0)
}

fn is_frame_file_name(name: &str) -> bool {
    name.strip_prefix("frame_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Number of `frame_<digits>.png` files in `dir`; a missing directory holds none.
pub fn count_frame_files(dir: &Path) -> LayerfadeResult<u64> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(LayerfadeError::encode(format!(
                "failed to read frame directory '{}': {e}",
                dir.display()
            )));
        }
    };
    let mut count = 0;
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read frame directory '{}'", dir.display()))?;
        if entry.file_name().to_str().is_some_and(is_frame_file_name) {
            count += 1;
        }
    }
    Ok(count)
}

/// Writes every frame as a PNG file into one directory.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    cfg: Option<SinkConfig>,
    guard: OrderGuard,
    written: u64,
}

impl PngSequenceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cfg: None,
            guard: OrderGuard::default(),
            written: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path frame `idx` is written to.
    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        self.dir.join(frame_file_name(idx))
    }

    /// Frames written since the last `begin`.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl FrameSink for PngSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> LayerfadeResult<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create frame directory '{}'", self.dir.display())
        })?;
        self.cfg = Some(cfg);
        self.guard.reset();
        self.written = 0;
        tracing::debug!(dir = %self.dir.display(), frames = cfg.frames, "writing png sequence");
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> LayerfadeResult<()> {
        self.guard.accept("png", self.cfg.as_ref(), idx, frame)?;
        let path = self.frame_path(idx);
        frame
            .to_image()?
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| {
                LayerfadeError::encode(format!("failed to write '{}': {e}", path.display()))
            })?;
        self.written += 1;
        Ok(())
    }

    fn end(&mut self) -> LayerfadeResult<()> {
        if self.cfg.take().is_none() {
            return Err(LayerfadeError::encode("png sink not started"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/png.rs"]
mod tests;
