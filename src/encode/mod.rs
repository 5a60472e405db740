pub mod ffmpeg;
pub mod png;
pub mod sink;
