pub mod encoder_factory;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_encoder;
pub mod ffmpeg_process_encoder;
