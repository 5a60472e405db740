use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use crate::assets::store::{AssetPaths, PreparedAssets};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::render::geometry::{CanvasGeometry, OverlayFit, compute_geometry};
use crate::timing::config::{TimingConfig, TimingSpec};
use crate::timing::opacity::OpacityVector;

/// JSON-facing description of one render job.
///
/// ```json
/// {
///   "assets": {
///     "background": "bg.png",
///     "layers": ["a.png", "b.png"],
///     "overlay": "frame.png",
///     "outro": "outro.png"
///   },
///   "timing": {
///     "fade": { "seconds": 3.3 },
///     "still": { "frames": 100 },
///     "fps": { "num": 30, "den": 1 }
///   }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    pub assets: AssetPaths,
    pub timing: TimingSpec,
    /// Policy for an overlay smaller than the content.
    #[serde(default)]
    pub overlay_fit: OverlayFit,
}

impl JobSpec {
    /// Parse a job from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> LayerfadeResult<Self> {
        serde_json::from_reader(r).map_err(|e| LayerfadeError::serde(format!("parse job JSON: {e}")))
    }

    /// Parse a job from a JSON file on disk. Paths are returned as written.
    pub fn from_path(path: impl AsRef<Path>) -> LayerfadeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            LayerfadeError::configuration(format!("open job JSON '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn to_json_pretty(&self) -> LayerfadeResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LayerfadeError::serde(format!("serialize job JSON: {e}")))
    }

    /// Copy of the job with relative asset paths joined onto `root`.
    pub fn resolved_against(&self, root: &Path) -> Self {
        Self {
            assets: self.assets.resolved_against(root),
            ..self.clone()
        }
    }

    /// Normalize and validate the timing for this job's layer count.
    pub fn timing_config(&self) -> LayerfadeResult<TimingConfig> {
        self.timing.to_config(self.assets.layers.len())
    }
}

/// Everything a render needs, loaded and validated once.
///
/// Immutable after construction; the assets are behind an `Arc` so sessions and workers can
/// share them without copying.
#[derive(Clone, Debug)]
pub struct PreparedJob {
    assets: Arc<PreparedAssets>,
    geometry: CanvasGeometry,
    timing: TimingConfig,
}

impl PreparedJob {
    /// Validate the timing, decode every image and compute the canvas.
    ///
    /// Timing errors surface before any image is read.
    #[tracing::instrument(skip(spec), fields(layers = spec.assets.layers.len()))]
    pub fn prepare(spec: &JobSpec) -> LayerfadeResult<Self> {
        let timing = spec.timing_config()?;
        let assets = PreparedAssets::load(&spec.assets)?;
        let job = Self::from_parts(assets, timing, spec.overlay_fit)?;
        tracing::info!(
            canvas = %job.geometry.canvas,
            offset = ?job.geometry.offset,
            overlay = job.geometry.overlay,
            frames = job.timing.total_frames(),
            "prepared job"
        );
        Ok(job)
    }

    /// Assemble a job from decoded assets.
    pub fn from_parts(
        mut assets: PreparedAssets,
        timing: TimingConfig,
        overlay_fit: OverlayFit,
    ) -> LayerfadeResult<Self> {
        if assets.layers().len() != timing.layer_count() {
            return Err(LayerfadeError::configuration(format!(
                "timing is for {} layers but {} were loaded",
                timing.layer_count(),
                assets.layers().len()
            )));
        }
        let geometry = compute_geometry(
            assets.content_size(),
            assets.overlay().map(|o| o.size()),
            overlay_fit,
        )?;
        if !geometry.overlay {
            assets.drop_overlay();
        }
        Ok(Self {
            assets: Arc::new(assets),
            geometry,
            timing,
        })
    }

    pub fn assets(&self) -> &PreparedAssets {
        &self.assets
    }

    pub fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    /// Opacities at `frame`; errors for frames outside the job.
    pub fn opacity(&self, frame: FrameIndex) -> LayerfadeResult<OpacityVector> {
        self.timing.opacity(frame)
    }
}

#[cfg(test)]
#[path = "../tests/unit/job.rs"]
mod tests;
