use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use timelapse_core::encoding::infrastructure::encoder_factory::EncoderBackend;
use timelapse_core::encoding::infrastructure::ffmpeg_process_encoder::DEFAULT_FFMPEG_PROGRAM;
use timelapse_core::shared::constants::{DEFAULT_FPS, DEFAULT_PREFIX};
use timelapse_core::shared::render_request::{EncodingFormat, Resolution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub frames_per_second: u32,
    pub resolution: Option<Resolution>,
    pub encoding_format: EncodingFormat,
    pub open_when_finished: bool,
    pub picture_dir: PathBuf,
    pub timelapse_dir: PathBuf,
    pub backend: EncoderBackend,
    pub ffmpeg_program: String,
    pub smoothed_eta: bool,
}

fn app_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_PREFIX)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frames_per_second: DEFAULT_FPS,
            resolution: None,
            encoding_format: EncodingFormat::default(),
            open_when_finished: false,
            picture_dir: app_dir().join("pictures"),
            timelapse_dir: app_dir().join("timelapses"),
            backend: EncoderBackend::default(),
            ffmpeg_program: DEFAULT_FFMPEG_PROGRAM.to_string(),
            smoothed_eta: false,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(DEFAULT_PREFIX).join("settings.json"))
    }

    /// Falls back to defaults when no settings were saved yet or the file
    /// cannot be parsed.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings in {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> io::Result<PathBuf> {
        let path = Self::config_path().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no configuration directory")
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
