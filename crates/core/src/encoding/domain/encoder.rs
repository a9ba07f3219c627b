use std::io::ErrorKind;
use std::path::Path;

use crate::shared::frame::Frame;

use super::encode_error::EncodeError;

/// Turns a sequence of still frames into one video file.
///
/// One encoder value serves exactly one render: `open`, then `encode_frame`
/// for every frame in order, then either `finish` or `abort`.
///
/// Contract for implementations:
/// - `finish` is only called after every frame was accepted.
/// - `abort` is idempotent and may be called at any point, any number of
///   times, including after `finish` failed.
/// - If `finish` (or anything before it) fails, the destination file is
///   removed before the error is returned. A half-written video must never
///   be left behind.
pub trait Encoder: Send {
    fn open(&mut self, output_path: &Path, frames_per_second: u32) -> Result<(), EncodeError>;

    /// `image` holds the raw bytes of the frame's file as read from disk.
    fn encode_frame(&mut self, frame: &Frame, image: &[u8]) -> Result<(), EncodeError>;

    fn finish(&mut self) -> Result<(), EncodeError>;

    fn abort(&mut self);
}

/// Deletes a partially written output. A missing file is not an error.
pub fn remove_partial_output(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed partial output {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove partial output {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_partial_output_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp4");
        std::fs::write(&path, b"partial").unwrap();
        remove_partial_output(&path);
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_partial_output_missing_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial_output(&dir.path().join("never-written.mp4"));
    }
}
