pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// `chrono` pattern for the `yyyy-MM-dd-HH-mm-ss` stamp embedded in frame
/// and output file names.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Length of a formatted [`TIMESTAMP_FORMAT`] stamp.
pub const TIMESTAMP_LEN: usize = 19;

pub const DEFAULT_PREFIX: &str = "DayAfterDay";
pub const OUTPUT_EXTENSION: &str = "mp4";

pub const DEFAULT_FPS: u32 = 10;
pub const MIN_FPS: u32 = 1;
pub const MAX_FPS: u32 = 99;

/// Shown in place of an ETA until a non-zero frame duration is sampled.
pub const UNKNOWN_ETA: &str = "--:--";
