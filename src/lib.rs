//! Layerfade renders a deterministic layer-fade animation.
//!
//! Foreground layers fade in one after another over a background, each followed by a hold, then
//! an outro image fades in on its own. An optional overlay frames everything and defines the
//! canvas. The public API is job-oriented:
//!
//! - Describe a job with a [`JobSpec`] (usually JSON) and load it into a [`PreparedJob`]
//! - Create a [`RenderSession`]
//! - Render single frames or stream a range into a [`FrameSink`]
//!
//! The same timing can instead be emitted as an ffmpeg filter graph with
//! [`build_filter_graph`], letting the encoder composite.
#![forbid(unsafe_code)]

mod foundation;

/// Image decoding and the per-job asset arena.
pub mod assets;
/// Frame sinks and the ffmpeg adapters.
pub mod encode;
/// Filter-graph emission.
pub mod graph;
/// Job description and preparation.
pub mod job;
/// Raster compositing and parallel rendering.
pub mod render;
/// Frame index to opacity mapping.
pub mod timing;

pub use crate::foundation::core::{Fps, FrameIndex, FrameRange, Size};
pub use crate::foundation::error::{LayerfadeError, LayerfadeResult};

pub use crate::assets::bitmap::{AlphaMask, Bitmap};
pub use crate::assets::store::{AssetPaths, Layer, PreparedAssets};
pub use crate::encode::ffmpeg::{
    DEFAULT_BG_RGBA, FfmpegSink, FfmpegSinkOpts, encode_png_sequence, is_ffmpeg_on_path,
    run_filter_graph,
};
pub use crate::encode::png::{PngSequenceSink, count_frame_files, frame_file_name};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::graph::filter::{FilterGraph, build_filter_graph};
pub use crate::job::{JobSpec, PreparedJob};
pub use crate::render::cancel::CancelToken;
pub use crate::render::compositor::{composite_frame, composite_outro};
pub use crate::render::frame::FrameRGBA;
pub use crate::render::geometry::{CanvasGeometry, OverlayFit, compute_geometry};
pub use crate::render::session::{RenderOpts, RenderSession, RenderStats};
pub use crate::timing::config::{Span, TimingConfig, TimingSpec};
pub use crate::timing::opacity::{FramePhase, OpacityVector, opacity_vector, outro_opacity};
