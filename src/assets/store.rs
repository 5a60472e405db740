use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::assets::bitmap::{AlphaMask, Bitmap};
use crate::assets::decode::load_image;
use crate::foundation::core::Size;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};

/// Resolved input image paths of one job.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetPaths {
    /// Base image every frame of the layer sequence starts from.
    pub background: PathBuf,
    /// Foreground layers in fade order.
    pub layers: Vec<PathBuf>,
    /// Decorative frame drawn above everything; defines the canvas size.
    #[serde(default)]
    pub overlay: Option<PathBuf>,
    /// Image faded in after the layer sequence.
    pub outro: PathBuf,
}

impl AssetPaths {
    /// Join every relative path onto `root`. Absolute paths are kept as-is.
    pub fn resolved_against(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            background: join(&self.background),
            layers: self.layers.iter().map(join).collect(),
            overlay: self.overlay.as_ref().map(join),
            outro: join(&self.outro),
        }
    }
}

/// One foreground layer with its alpha plane.
#[derive(Clone, Debug)]
pub struct Layer {
    pub source: PathBuf,
    pub bitmap: Bitmap,
    pub mask: AlphaMask,
}

impl Layer {
    pub fn new(source: impl Into<PathBuf>, bitmap: Bitmap) -> Self {
        let mask = AlphaMask::extract(&bitmap);
        Self {
            source: source.into(),
            bitmap,
            mask,
        }
    }
}

/// Every bitmap of a job, decoded once and shared read-only by all render workers.
#[derive(Debug)]
pub struct PreparedAssets {
    background: Bitmap,
    layers: Vec<Layer>,
    overlay: Option<Bitmap>,
    outro: Layer,
}

impl PreparedAssets {
    /// Decode every input image.
    ///
    /// Layers and the outro must match the background size.
    #[tracing::instrument(skip(paths), fields(layers = paths.layers.len()))]
    pub fn load(paths: &AssetPaths) -> LayerfadeResult<Self> {
        if paths.layers.is_empty() {
            return Err(LayerfadeError::configuration(
                "at least one layer image is required",
            ));
        }

        let background = load_image(&paths.background)?;
        let layers = paths
            .layers
            .par_iter()
            .map(|p| load_image(p).map(|b| Layer::new(p, b)))
            .collect::<LayerfadeResult<Vec<_>>>()?;
        let outro = Layer::new(&paths.outro, load_image(&paths.outro)?);
        let overlay = paths.overlay.as_deref().map(load_image).transpose()?;

        tracing::debug!(
            background = %background.size(),
            overlay = ?overlay.as_ref().map(Bitmap::size),
            "decoded job assets"
        );
        Self::from_parts(background, layers, overlay, outro)
    }

    /// Assemble already-decoded bitmaps, checking that sizes agree.
    pub fn from_parts(
        background: Bitmap,
        layers: Vec<Layer>,
        overlay: Option<Bitmap>,
        outro: Layer,
    ) -> LayerfadeResult<Self> {
        if layers.is_empty() {
            return Err(LayerfadeError::configuration(
                "at least one layer image is required",
            ));
        }
        let content = background.size();
        for layer in layers.iter().chain(std::iter::once(&outro)) {
            check_content_size(&layer.source, layer.bitmap.size(), content)?;
        }
        Ok(Self {
            background,
            layers,
            overlay,
            outro,
        })
    }

    pub fn background(&self) -> &Bitmap {
        &self.background
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn overlay(&self) -> Option<&Bitmap> {
        self.overlay.as_ref()
    }

    pub fn outro(&self) -> &Layer {
        &self.outro
    }

    /// Size of the content rectangle (the background).
    pub fn content_size(&self) -> Size {
        self.background.size()
    }

    pub(crate) fn drop_overlay(&mut self) {
        self.overlay = None;
    }
}

fn check_content_size(source: &Path, got: Size, content: Size) -> LayerfadeResult<()> {
    if got != content {
        return Err(LayerfadeError::asset(
            source,
            format!("image is {got} but the background is {content}; sizes must match"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/assets/store.rs"]
mod tests;
