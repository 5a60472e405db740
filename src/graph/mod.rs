//! Filter-graph backend: the same timing and layering, delegated to ffmpeg.

pub mod filter;
