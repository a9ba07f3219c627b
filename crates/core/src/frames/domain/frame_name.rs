use std::path::Path;

use chrono::NaiveDateTime;

use crate::shared::constants::{IMAGE_EXTENSIONS, TIMESTAMP_FORMAT, TIMESTAMP_LEN};
use crate::shared::frame::LensFacing;

/// Fields recovered from a frame file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedFrameName {
    pub captured_at: NaiveDateTime,
    pub lens: Option<LensFacing>,
}

/// Parses `<prefix>-<yyyy-MM-dd-HH-mm-ss>[-F|-B].<image ext>`.
///
/// Returns `None` for anything else, including names without a prefix and
/// non-image extensions.
pub fn parse_frame_name(name: &str) -> Option<ParsedFrameName> {
    let path = Path::new(name);
    let ext = path.extension()?.to_str()?;
    if !is_image_extension(ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;

    let (stem, lens) = match stem.rsplit_once('-') {
        Some((rest, suffix)) => match LensFacing::from_suffix(suffix) {
            Some(lens) => (rest, Some(lens)),
            None => (stem, None),
        },
        None => return None,
    };

    if stem.len() < TIMESTAMP_LEN + 2 || !stem.is_char_boundary(stem.len() - TIMESTAMP_LEN) {
        return None;
    }
    let (head, stamp) = stem.split_at(stem.len() - TIMESTAMP_LEN);
    let prefix = head.strip_suffix('-')?;
    if prefix.is_empty() {
        return None;
    }

    let captured_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some(ParsedFrameName { captured_at, lens })
}

pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[rstest]
    #[case::front("DayAfterDay-2019-06-01-08-30-05-F.jpg", Some(LensFacing::Front))]
    #[case::back("DayAfterDay-2019-06-01-08-30-05-B.jpg", Some(LensFacing::Back))]
    #[case::no_lens("DayAfterDay-2019-06-01-08-30-05.jpg", None)]
    #[case::upper_ext("DayAfterDay-2019-06-01-08-30-05-F.JPG", Some(LensFacing::Front))]
    #[case::png("DayAfterDay-2019-06-01-08-30-05.png", None)]
    #[case::dashed_prefix("My-Garden-2019-06-01-08-30-05-B.webp", Some(LensFacing::Back))]
    fn test_parses_valid_names(#[case] name: &str, #[case] lens: Option<LensFacing>) {
        let parsed = parse_frame_name(name).unwrap();
        assert_eq!(parsed.captured_at, at(2019, 6, 1, 8, 30, 5));
        assert_eq!(parsed.lens, lens);
    }

    #[rstest]
    #[case::not_image("DayAfterDay-2019-06-01-08-30-05.txt")]
    #[case::no_extension("DayAfterDay-2019-06-01-08-30-05")]
    #[case::no_prefix("2019-06-01-08-30-05.jpg")]
    #[case::empty_prefix("-2019-06-01-08-30-05.jpg")]
    #[case::bad_month("DayAfterDay-2019-13-01-08-30-05.jpg")]
    #[case::short_stamp("DayAfterDay-2019-06-01-08-30.jpg")]
    #[case::unknown_lens("DayAfterDay-2019-06-01-08-30-05-X.jpg")]
    #[case::random("holiday.jpg")]
    #[case::output_video("DayAfterDay-2019-06-01-08-30-05.mp4")]
    fn test_rejects_invalid_names(#[case] name: &str) {
        assert!(parse_frame_name(name).is_none(), "{name} should not parse");
    }

    #[test]
    fn test_image_extension_case_insensitive() {
        assert!(is_image_extension("JPEG"));
        assert!(is_image_extension("tif"));
        assert!(!is_image_extension("gif"));
    }
}
