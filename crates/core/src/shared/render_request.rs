use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::constants::{DEFAULT_PREFIX, MAX_FPS, MIN_FPS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("frames per second must be between 1 and 99, got {0}")]
    FrameRate(u32),
    #[error("output prefix must not be empty")]
    EmptyPrefix,
    #[error("unknown resolution '{0}' (expected 720p, 1080p, 1440p or 2160p)")]
    UnknownResolution(String),
    #[error("unknown encoding format '{0}' (expected x264 or x265)")]
    UnknownFormat(String),
}

/// Portrait output sizes offered for a timelapse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    #[serde(rename = "720p")]
    Res720p,
    #[serde(rename = "1080p")]
    Res1080p,
    #[serde(rename = "1440p")]
    Res1440p,
    #[serde(rename = "2160p")]
    Res2160p,
}

impl Resolution {
    pub const ALL: &[Resolution] = &[
        Resolution::Res720p,
        Resolution::Res1080p,
        Resolution::Res1440p,
        Resolution::Res2160p,
    ];

    /// `(width, height)` in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Resolution::Res720p => (720, 1280),
            Resolution::Res1080p => (1080, 1920),
            Resolution::Res1440p => (1440, 2560),
            Resolution::Res2160p => (2160, 3840),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Res720p => write!(f, "720p"),
            Resolution::Res1080p => write!(f, "1080p"),
            Resolution::Res1440p => write!(f, "1440p"),
            Resolution::Res2160p => write!(f, "2160p"),
        }
    }
}

impl FromStr for Resolution {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .iter()
            .copied()
            .find(|r| r.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| RequestError::UnknownResolution(s.to_string()))
    }
}

/// Video codec used for the output stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    #[default]
    #[serde(rename = "x264")]
    H264,
    #[serde(rename = "x265")]
    H265,
}

impl EncodingFormat {
    /// Name of the ffmpeg encoder implementing this format.
    pub fn ffmpeg_encoder(&self) -> &'static str {
        match self {
            EncodingFormat::H264 => "libx264",
            EncodingFormat::H265 => "libx265",
        }
    }
}

impl fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingFormat::H264 => write!(f, "x264"),
            EncodingFormat::H265 => write!(f, "x265"),
        }
    }
}

impl FromStr for EncodingFormat {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x264" | "h264" | "libx264" => Ok(EncodingFormat::H264),
            "x265" | "h265" | "hevc" | "libx265" => Ok(EncodingFormat::H265),
            _ => Err(RequestError::UnknownFormat(s.to_string())),
        }
    }
}

/// Parameters for one render invocation. Validated on construction and
/// immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    frames_per_second: u32,
    output_dir: PathBuf,
    open_when_finished: bool,
    input_dir: Option<PathBuf>,
    resolution: Option<Resolution>,
    format: EncodingFormat,
    prefix: String,
}

impl RenderRequest {
    pub fn new(
        frames_per_second: u32,
        output_dir: impl Into<PathBuf>,
        open_when_finished: bool,
    ) -> Result<Self, RequestError> {
        if !(MIN_FPS..=MAX_FPS).contains(&frames_per_second) {
            return Err(RequestError::FrameRate(frames_per_second));
        }
        Ok(Self {
            frames_per_second,
            output_dir: output_dir.into(),
            open_when_finished,
            input_dir: None,
            resolution: None,
            format: EncodingFormat::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        })
    }

    /// Reads frames from `dir` instead of the engine's picture directory.
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(dir.into());
        self
    }

    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_format(mut self, format: EncodingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Result<Self, RequestError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(RequestError::EmptyPrefix);
        }
        self.prefix = prefix;
        Ok(self)
    }

    pub fn frames_per_second(&self) -> u32 {
        self.frames_per_second
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn open_when_finished(&self) -> bool {
        self.open_when_finished
    }

    pub fn input_dir(&self) -> Option<&Path> {
        self.input_dir.as_deref()
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn format(&self) -> EncodingFormat {
        self.format
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
