use std::path::PathBuf;

use crate::foundation::core::FrameIndex;

pub type LayerfadeResult<T> = Result<T, LayerfadeError>;

/// Every failure the engine can surface. All kinds abort the job.
#[derive(thiserror::Error, Debug)]
pub enum LayerfadeError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("asset error: '{}': {message}", .path.display())]
    Asset { path: PathBuf, message: String },

    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("render error{}: {message}", fmt_frame(.frame))]
    Render {
        frame: Option<FrameIndex>,
        message: String,
    },

    #[error("render cancelled before frame {}", .next_frame.0)]
    Cancelled { next_frame: FrameIndex },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayerfadeError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn asset(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::Asset {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            frame: None,
            message: msg.into(),
        }
    }

    pub fn render_at(frame: FrameIndex, msg: impl Into<String>) -> Self {
        Self::Render {
            frame: Some(frame),
            message: msg.into(),
        }
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Attach `frame` to a render error that does not carry one yet.
    ///
    /// Other kinds pass through untouched; `Other` is wrapped into a render error so the caller
    /// can still report which frame failed.
    pub fn at_frame(self, frame: FrameIndex) -> Self {
        match self {
            Self::Render {
                frame: None,
                message,
            } => Self::Render {
                frame: Some(frame),
                message,
            },
            Self::Other(e) => Self::Render {
                frame: Some(frame),
                message: format!("{e:#}"),
            },
            other => other,
        }
    }

    /// Frame index associated with this error, if any.
    pub fn frame(&self) -> Option<FrameIndex> {
        match self {
            Self::Render { frame, .. } => *frame,
            Self::Cancelled { next_frame } => Some(*next_frame),
            _ => None,
        }
    }
}

fn fmt_frame(frame: &Option<FrameIndex>) -> String {
    match frame {
        Some(f) => format!(" at frame {}", f.0),
        None => String::new(),
    }
}
