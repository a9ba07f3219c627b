use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::encoding::domain::encode_error::EncodeError;
use crate::encoding::domain::encoder::{remove_partial_output, Encoder};
use crate::shared::frame::Frame;
use crate::shared::render_request::{EncodingFormat, Resolution};

pub const DEFAULT_FFMPEG_PROGRAM: &str = "ffmpeg";

/// Lines of ffmpeg stderr kept in the error when the process fails.
const STDERR_TAIL_LINES: usize = 20;

/// Renders by running an external `ffmpeg` once, after all frames are known.
///
/// `encode_frame` only records frame paths. `finish` writes them to a
/// concat-demuxer manifest and runs the encoder process against it.
pub struct FfmpegProcessEncoder {
    program: OsString,
    leading_args: Vec<OsString>,
    format: EncodingFormat,
    resolution: Option<Resolution>,
    output_path: Option<PathBuf>,
    frames_per_second: u32,
    frames: Vec<PathBuf>,
}

impl FfmpegProcessEncoder {
    pub fn new(format: EncodingFormat, resolution: Option<Resolution>) -> Self {
        Self {
            program: OsString::from(DEFAULT_FFMPEG_PROGRAM),
            leading_args: Vec::new(),
            format,
            resolution,
            output_path: None,
            frames_per_second: 0,
            frames: Vec::new(),
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before the ffmpeg template, for wrapper launchers
    /// such as `nice -n 10 ffmpeg`.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    fn run(&self, output_path: &Path) -> Result<(), EncodeError> {
        let mut manifest = tempfile::Builder::new()
            .prefix("timelapse-frames-")
            .suffix(".txt")
            .tempfile()
            .map_err(EncodeError::Manifest)?;
        manifest
            .write_all(concat_manifest(&self.frames).as_bytes())
            .and_then(|_| manifest.flush())
            .map_err(EncodeError::Manifest)?;

        let args = build_args(
            self.frames_per_second,
            manifest.path(),
            output_path,
            self.format,
            self.resolution,
        );
        log::debug!("Running {} {:?}", self.program_name(), args);

        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| EncodeError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EncodeError::ProcessFailed {
                program: self.program_name(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            })
        }
    }
}

impl Encoder for FfmpegProcessEncoder {
    fn open(&mut self, output_path: &Path, frames_per_second: u32) -> Result<(), EncodeError> {
        if frames_per_second == 0 {
            return Err(EncodeError::InvalidFrameRate(frames_per_second));
        }
        self.output_path = Some(output_path.to_path_buf());
        self.frames_per_second = frames_per_second;
        self.frames.clear();
        Ok(())
    }

    fn encode_frame(&mut self, frame: &Frame, image: &[u8]) -> Result<(), EncodeError> {
        if self.output_path.is_none() {
            return Err(EncodeError::NotOpened);
        }
        if image.is_empty() {
            return Err(EncodeError::Codec(format!(
                "frame {} ({}) is empty",
                frame.index(),
                frame.path().display()
            )));
        }
        self.frames.push(frame.path().to_path_buf());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        let output_path = self.output_path.clone().ok_or(EncodeError::NotOpened)?;

        match self.run(&output_path) {
            Ok(()) => {
                log::info!(
                    "{} encoded {} frames into {}",
                    self.program_name(),
                    self.frames.len(),
                    output_path.display()
                );
                self.output_path = None;
                self.frames.clear();
                Ok(())
            }
            Err(e) => {
                remove_partial_output(&output_path);
                Err(e)
            }
        }
    }

    fn abort(&mut self) {
        if let Some(path) = self.output_path.take() {
            remove_partial_output(&path);
        }
        self.frames.clear();
    }
}

/// Builds the ffmpeg concat-demuxer input: one `file '<path>'` line per frame.
pub fn concat_manifest(frames: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for path in frames {
        let escaped = path.to_string_lossy().replace('\'', "'\\''");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}

/// Fixed ffmpeg argument template for one render.
pub fn build_args(
    frames_per_second: u32,
    manifest: &Path,
    output: &Path,
    format: EncodingFormat,
    resolution: Option<Resolution>,
) -> Vec<OsString> {
    let fps = frames_per_second.to_string();
    let scale = match resolution {
        Some(r) => {
            let (w, h) = r.dimensions();
            format!("scale={w}:{h}")
        }
        // yuv420p needs even dimensions.
        None => "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
    };

    vec![
        "-y".into(),
        "-r".into(),
        fps.clone().into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        manifest.into(),
        "-vf".into(),
        scale.into(),
        "-c:v".into(),
        format.ffmpeg_encoder().into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-r".into(),
        fps.into(),
        output.into(),
    ]
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
