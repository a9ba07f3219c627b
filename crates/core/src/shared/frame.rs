use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Which camera captured a frame, taken from the `-F` / `-B` name suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "F" => Some(LensFacing::Front),
            "B" => Some(LensFacing::Back),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            LensFacing::Front => "F",
            LensFacing::Back => "B",
        }
    }
}

/// One still image on disk, positioned within a render.
///
/// Frames are immutable once listed; the pixel data is read lazily by the
/// engine right before it is handed to the encoder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    path: PathBuf,
    captured_at: NaiveDateTime,
    lens: Option<LensFacing>,
    index: usize,
}

impl Frame {
    pub fn new(
        path: PathBuf,
        captured_at: NaiveDateTime,
        lens: Option<LensFacing>,
        index: usize,
    ) -> Self {
        Self {
            path,
            captured_at,
            lens,
            index,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn captured_at(&self) -> NaiveDateTime {
        self.captured_at
    }

    pub fn lens(&self) -> Option<LensFacing> {
        self.lens
    }

    /// Zero-based ordinal within the render.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}
