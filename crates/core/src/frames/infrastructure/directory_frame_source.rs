use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::frames::domain::frame_name::parse_frame_name;
use crate::frames::domain::frame_source::{FrameSource, FrameSourceError};
use crate::shared::frame::Frame;

/// Lists timestamped picture files from a directory on disk.
///
/// Subdirectories and names that do not follow the frame naming pattern are
/// skipped. Frames are ordered by the timestamp in their name, then by file
/// name.
pub struct DirectoryFrameSource;

impl DirectoryFrameSource {
    pub fn new() -> Self {
        Self
    }

    /// Returns the newest frame in `dir`, if any.
    pub fn latest_frame(&self, dir: &Path) -> Result<Option<Frame>, FrameSourceError> {
        match self.list(dir) {
            Ok(mut frames) => Ok(frames.pop()),
            Err(FrameSourceError::Empty { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Default for DirectoryFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for DirectoryFrameSource {
    fn list(&self, dir: &Path) -> Result<Vec<Frame>, FrameSourceError> {
        let io_err = |source: std::io::Error| FrameSourceError::Io {
            dir: dir.to_path_buf(),
            source,
        };

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FrameSourceError::Empty {
                    dir: dir.to_path_buf(),
                })
            }
            Err(e) => return Err(io_err(e)),
        };

        let mut frames = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            if entry.file_type().map_err(io_err)?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                log::debug!("Skipping non UTF-8 entry {:?}", entry.path());
                continue;
            };
            match parse_frame_name(name) {
                Some(parsed) => {
                    let path = absolute(&entry.path());
                    frames.push(Frame::new(path, parsed.captured_at, parsed.lens, 0));
                }
                None => log::debug!("Skipping {name}: not a timestamped picture"),
            }
        }

        if frames.is_empty() {
            return Err(FrameSourceError::Empty {
                dir: dir.to_path_buf(),
            });
        }

        frames.sort_by(|a, b| {
            a.captured_at()
                .cmp(&b.captured_at())
                .then_with(|| a.file_name().cmp(b.file_name()))
        });

        log::debug!("Listed {} frames from {}", frames.len(), dir.display());

        Ok(frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| frame.with_index(i))
            .collect())
    }
}

fn absolute(path: &Path) -> std::path::PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::LensFacing;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"jpeg").unwrap();
    }

    fn names(frames: &[Frame]) -> Vec<&str> {
        frames.iter().map(|f| f.file_name()).collect()
    }

    #[test]
    fn test_sorted_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-03-09-00-00-F.jpg");
        touch(dir.path(), "DayAfterDay-2019-12-31-23-59-59-B.jpg");
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00-F.jpg");

        let frames = DirectoryFrameSource::new().list(dir.path()).unwrap();
        assert_eq!(
            names(&frames),
            vec![
                "DayAfterDay-2019-12-31-23-59-59-B.jpg",
                "DayAfterDay-2020-01-01-00-00-00-F.jpg",
                "DayAfterDay-2020-01-03-09-00-00-F.jpg",
            ]
        );
        for pair in frames.windows(2) {
            assert!(pair[0].captured_at() <= pair[1].captured_at());
        }
    }

    #[test]
    fn test_indices_follow_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-02-00-00-00.jpg");
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00.jpg");

        let frames = DirectoryFrameSource::new().list(dir.path()).unwrap();
        let indices: Vec<_> = frames.iter().map(|f| f.index()).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(frames[0].file_name(), "DayAfterDay-2020-01-01-00-00-00.jpg");
    }

    #[test]
    fn test_ties_broken_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00-F.jpg");
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00-B.jpg");

        let frames = DirectoryFrameSource::new().list(dir.path()).unwrap();
        assert_eq!(frames[0].lens(), Some(LensFacing::Back));
        assert_eq!(frames[1].lens(), Some(LensFacing::Front));
    }

    #[test]
    fn test_skips_directories_and_unparsable_names() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00-F.jpg");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "holiday.jpg");
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00.mp4");
        fs::create_dir(dir.path().join("DayAfterDay-2020-01-02-00-00-00-F.jpg")).unwrap();

        let frames = DirectoryFrameSource::new().list(dir.path()).unwrap();
        assert_eq!(names(&frames), vec!["DayAfterDay-2020-01-01-00-00-00-F.jpg"]);
    }

    #[test]
    fn test_paths_are_absolute() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00.png");

        let frames = DirectoryFrameSource::new().list(dir.path()).unwrap();
        assert!(frames[0].path().is_absolute());
    }

    #[test]
    fn test_empty_directory_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");
        let result = DirectoryFrameSource::new().list(dir.path());
        assert!(matches!(result, Err(FrameSourceError::Empty { .. })));
    }

    #[test]
    fn test_missing_directory_is_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let result = DirectoryFrameSource::new().list(&dir.path().join("missing"));
        assert!(matches!(result, Err(FrameSourceError::Empty { .. })));
    }

    #[test]
    fn test_relists_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00.jpg");
        let source = DirectoryFrameSource::new();
        assert_eq!(source.list(dir.path()).unwrap().len(), 1);

        touch(dir.path(), "DayAfterDay-2020-01-02-00-00-00.jpg");
        assert_eq!(source.list(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_latest_frame() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryFrameSource::new();
        assert!(source.latest_frame(dir.path()).unwrap().is_none());

        touch(dir.path(), "DayAfterDay-2020-01-02-00-00-00.jpg");
        touch(dir.path(), "DayAfterDay-2020-01-01-00-00-00.jpg");
        let latest = source.latest_frame(dir.path()).unwrap().unwrap();
        assert_eq!(latest.file_name(), "DayAfterDay-2020-01-02-00-00-00.jpg");
    }
}
