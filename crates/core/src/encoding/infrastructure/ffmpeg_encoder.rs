use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbImage;

use crate::encoding::domain::encode_error::EncodeError;
use crate::encoding::domain::encoder::{remove_partial_output, Encoder};
use crate::shared::frame::Frame;
use crate::shared::render_request::{EncodingFormat, Resolution};

/// Encodes frames in-process via ffmpeg-next, one decoded image at a time.
///
/// The container is created lazily on the first frame, because the output
/// size defaults to the first picture's dimensions.
pub struct FfmpegEncoder {
    format: EncodingFormat,
    resolution: Option<Resolution>,
    output_path: Option<PathBuf>,
    fps: i32,
    session: Option<Session>,
}

// Safety: FfmpegEncoder is only used from the render worker thread.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegEncoder {}

struct Session {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: i64,
    stream_time_base: ffmpeg_next::Rational,
}

const VIDEO_STREAM_INDEX: usize = 0;

impl FfmpegEncoder {
    pub fn new(format: EncodingFormat, resolution: Option<Resolution>) -> Self {
        Self {
            format,
            resolution,
            output_path: None,
            fps: 0,
            session: None,
        }
    }

    fn output_size(&self, image: &RgbImage) -> (u32, u32) {
        match self.resolution {
            Some(r) => r.dimensions(),
            // yuv420p needs even dimensions.
            None => (image.width() & !1, image.height() & !1),
        }
    }

    fn start_session(&self, path: &Path, width: u32, height: u32) -> Result<Session, EncodeError> {
        if width == 0 || height == 0 {
            return Err(EncodeError::Codec(format!(
                "cannot encode {width}x{height} frames"
            )));
        }

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name(self.format.ffmpeg_encoder())
            .or_else(|| {
                log::warn!(
                    "{} not available, falling back to MPEG-4",
                    self.format.ffmpeg_encoder()
                );
                ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            })
            .ok_or_else(|| EncodeError::Codec("no usable video encoder".to_string()))?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, self.fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(self.fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        octx.write_header()?;

        let stream_time_base = octx
            .stream(VIDEO_STREAM_INDEX)
            .map(|s| s.time_base())
            .ok_or_else(|| EncodeError::Codec("output stream missing".to_string()))?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::format::Pixel::YUV420P,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        log::info!(
            "Encoding {}x{} @ {} fps with {} into {}",
            width,
            height,
            self.fps,
            codec.name(),
            path.display()
        );

        Ok(Session {
            octx,
            encoder,
            scaler,
            width,
            height,
            fps: self.fps,
            frame_count: 0,
            stream_time_base,
        })
    }
}

impl Session {
    fn write(&mut self, image: &RgbImage) -> Result<(), EncodeError> {
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );

        let stride = rgb_frame.stride(0);
        let row_bytes = self.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        let src = image.as_raw();

        // Copy pixel data, respecting stride
        for row in 0..self.height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count));

        self.encoder.send_frame(&yuv_frame)?;
        self.drain()?;

        self.frame_count += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), EncodeError> {
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(VIDEO_STREAM_INDEX);
            encoded.rescale_ts(ffmpeg_next::Rational(1, self.fps), self.stream_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        Ok(())
    }
}

impl Encoder for FfmpegEncoder {
    fn open(&mut self, output_path: &Path, frames_per_second: u32) -> Result<(), EncodeError> {
        ffmpeg_next::init()?;

        let fps = i32::try_from(frames_per_second)
            .ok()
            .filter(|fps| *fps > 0)
            .ok_or(EncodeError::InvalidFrameRate(frames_per_second))?;

        self.fps = fps;
        self.output_path = Some(output_path.to_path_buf());
        self.session = None;
        Ok(())
    }

    fn encode_frame(&mut self, frame: &Frame, image: &[u8]) -> Result<(), EncodeError> {
        let path = self.output_path.clone().ok_or(EncodeError::NotOpened)?;

        let decoded = image::load_from_memory(image)
            .map_err(|source| EncodeError::Image {
                index: frame.index(),
                source,
            })?
            .to_rgb8();

        if self.session.is_none() {
            let (width, height) = self.output_size(&decoded);
            self.session = Some(self.start_session(&path, width, height)?);
        }
        let session = self.session.as_mut().ok_or(EncodeError::NotOpened)?;

        if decoded.dimensions() == (session.width, session.height) {
            session.write(&decoded)
        } else {
            let resized =
                image::imageops::resize(&decoded, session.width, session.height, FilterType::Triangle);
            session.write(&resized)
        }
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        let path = self.output_path.clone().ok_or(EncodeError::NotOpened)?;

        let result = match self.session.as_mut() {
            Some(session) => session.finish(),
            None => Err(EncodeError::Codec("no frames were encoded".to_string())),
        };
        // Dropping the session closes the output file.
        let frames = self.session.take().map_or(0, |s| s.frame_count);

        match result {
            Ok(()) => {
                log::info!("Encoded {frames} frames into {}", path.display());
                self.output_path = None;
                Ok(())
            }
            Err(e) => {
                remove_partial_output(&path);
                Err(e)
            }
        }
    }

    fn abort(&mut self) {
        self.session = None;
        if let Some(path) = self.output_path.take() {
            remove_partial_output(&path);
        }
    }
}
