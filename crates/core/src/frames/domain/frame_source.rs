use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum FrameSourceError {
    #[error("no frames found in {}", dir.display())]
    Empty { dir: PathBuf },
    #[error("failed to list frames in {}: {source}", dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Enumerates the still images that make up one render.
///
/// Implementations must re-read their backing store on every call and return
/// frames oldest first, indexed from zero in that order.
pub trait FrameSource: Send + Sync {
    fn list(&self, dir: &Path) -> Result<Vec<Frame>, FrameSourceError>;
}
