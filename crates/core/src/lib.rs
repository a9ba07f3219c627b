//! Timelapse rendering pipeline.
//!
//! Still images listed by a [`frames`] source are fed one at a time into an
//! [`encoding`] backend by the [`render`] engine, which reports
//! [`progress`] and terminal outcomes to an observer.

pub mod encoding;
pub mod frames;
pub mod progress;
pub mod render;
pub mod shared;
