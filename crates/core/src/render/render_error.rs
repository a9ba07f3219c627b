use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::domain::encode_error::EncodeError;
use crate::frames::domain::frame_source::FrameSourceError;
use crate::shared::render_request::RequestError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("no timelapse pictures found in {}", dir.display())]
    EmptyInput { dir: PathBuf },
    #[error("failed to list pictures in {}: {source}", dir.display())]
    Listing {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("failed to read {}: {source}", path.display())]
    FrameRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a render is already in progress")]
    AlreadyRunning,
    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create output file in {}: {source}", dir.display())]
    OutputFile {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid render request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("failed to start render worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl From<FrameSourceError> for RenderError {
    fn from(err: FrameSourceError) -> Self {
        match err {
            FrameSourceError::Empty { dir } => RenderError::EmptyInput { dir },
            FrameSourceError::Io { dir, source } => RenderError::Listing { dir, source },
        }
    }
}
