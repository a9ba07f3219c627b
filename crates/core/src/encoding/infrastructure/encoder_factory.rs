use std::ffi::OsString;

use serde::{Deserialize, Serialize};

use crate::encoding::domain::encode_error::EncodeError;
use crate::encoding::domain::encoder::Encoder;
use crate::shared::render_request::{EncodingFormat, Resolution};

use super::ffmpeg_process_encoder::{FfmpegProcessEncoder, DEFAULT_FFMPEG_PROGRAM};

/// Which encoder implementation renders the video.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EncoderBackend {
    /// Links libav through ffmpeg-next. Requires the `ffmpeg` feature.
    InProcess,
    /// Runs an external `ffmpeg` executable once per render. Progress only
    /// covers handing frames over; encoding runs during `finish`.
    Process,
}

/// In-process when compiled in, so progress tracks actual encoding.
impl Default for EncoderBackend {
    fn default() -> Self {
        if cfg!(feature = "ffmpeg") {
            EncoderBackend::InProcess
        } else {
            EncoderBackend::Process
        }
    }
}

impl EncoderBackend {
    pub fn is_available(self) -> bool {
        match self {
            EncoderBackend::InProcess => cfg!(feature = "ffmpeg"),
            EncoderBackend::Process => true,
        }
    }
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::InProcess => write!(f, "in-process"),
            EncoderBackend::Process => write!(f, "process"),
        }
    }
}

impl std::str::FromStr for EncoderBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "in-process" | "inprocess" | "ffmpeg-next" => Ok(EncoderBackend::InProcess),
            "process" | "ffmpeg" => Ok(EncoderBackend::Process),
            _ => Err(format!("unknown encoder backend: {s} (expected in-process or process)")),
        }
    }
}

/// Settings shared by every encoder created for a render.
#[derive(Clone, Debug)]
pub struct EncoderOptions {
    pub format: EncodingFormat,
    pub resolution: Option<Resolution>,
    pub ffmpeg_program: OsString,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            format: EncodingFormat::default(),
            resolution: None,
            ffmpeg_program: OsString::from(DEFAULT_FFMPEG_PROGRAM),
        }
    }
}

/// Creates a fresh encoder for one render.
pub fn create_encoder(
    backend: EncoderBackend,
    options: &EncoderOptions,
) -> Result<Box<dyn Encoder>, EncodeError> {
    match backend {
        #[cfg(feature = "ffmpeg")]
        EncoderBackend::InProcess => {
            log::info!("Using in-process ffmpeg backend ({})", options.format);
            Ok(Box::new(super::ffmpeg_encoder::FfmpegEncoder::new(
                options.format,
                options.resolution,
            )))
        }
        #[cfg(not(feature = "ffmpeg"))]
        EncoderBackend::InProcess => Err(EncodeError::Codec(
            "in-process backend not compiled in (enable the `ffmpeg` feature)".to_string(),
        )),
        EncoderBackend::Process => {
            log::info!(
                "Using {} process backend ({})",
                options.ffmpeg_program.to_string_lossy(),
                options.format
            );
            Ok(Box::new(
                FfmpegProcessEncoder::new(options.format, options.resolution)
                    .with_program(options.ffmpeg_program.clone()),
            ))
        }
    }
}
