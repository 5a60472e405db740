//! Input images: decoding, one-time preparation and the per-layer alpha cache.

pub mod bitmap;
pub mod decode;
pub mod store;
