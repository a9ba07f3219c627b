use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder used before open")]
    NotOpened,
    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(u32),
    #[cfg(feature = "ffmpeg")]
    #[error("failed to decode frame {index}: {source}")]
    Image {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("codec error: {0}")]
    Codec(String),
    #[cfg(feature = "ffmpeg")]
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("failed to write frame manifest: {0}")]
    Manifest(#[source] std::io::Error),
}
