mod settings;

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::Receiver;

use timelapse_core::encoding::infrastructure::encoder_factory::{
    create_encoder, EncoderBackend, EncoderOptions,
};
use timelapse_core::frames::infrastructure::directory_frame_source::DirectoryFrameSource;
use timelapse_core::progress::progress_estimator::EtaStrategy;
use timelapse_core::render::render_error::RenderError;
use timelapse_core::render::render_observer::LogRenderObserver;
use timelapse_core::render::render_state::{RenderEvent, RenderHandle, RenderState};
use timelapse_core::render::timelapse_engine::{EngineConfig, TimelapseEngine};
use timelapse_core::shared::render_request::{EncodingFormat, RenderRequest, Resolution};

use settings::Settings;

/// Renders a directory of daily pictures into a timelapse video.
#[derive(Parser)]
#[command(name = "timelapse", version)]
struct Cli {
    /// Directory holding the timestamped pictures.
    #[arg(long)]
    pictures: Option<PathBuf>,

    /// Directory the video is written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Frames per second (1-99).
    #[arg(long)]
    fps: Option<u32>,

    /// Output size: 720p, 1080p, 1440p or 2160p. Defaults to the picture size.
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Video codec: x264 or x265.
    #[arg(long)]
    format: Option<EncodingFormat>,

    /// Encoder backend: process or in-process.
    #[arg(long)]
    backend: Option<EncoderBackend>,

    /// ffmpeg executable used by the process backend.
    #[arg(long)]
    ffmpeg: Option<String>,

    /// Open the video once it is written.
    #[arg(long)]
    open: bool,

    /// Average frame durations for the remaining-time estimate.
    #[arg(long)]
    smoothed_eta: bool,

    /// Store the effective options as the new defaults.
    #[arg(long)]
    save_settings: bool,

    /// Print the newest picture and exit.
    #[arg(long)]
    latest: bool,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = apply(&cli, Settings::load());

    if cli.latest {
        return print_latest(&settings);
    }

    let request = build_request(&settings)?;
    if !settings.backend.is_available() {
        return Err(format!(
            "the {} backend is not available in this build",
            settings.backend
        )
        .into());
    }

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Saved settings to {}", path.display());
    }

    let state = render(&settings, request, interrupt_channel())?;
    report(state)
}

/// Command-line options take precedence over saved settings.
fn apply(cli: &Cli, mut settings: Settings) -> Settings {
    if let Some(dir) = &cli.pictures {
        settings.picture_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        settings.timelapse_dir = dir.clone();
    }
    if let Some(fps) = cli.fps {
        settings.frames_per_second = fps;
    }
    if cli.resolution.is_some() {
        settings.resolution = cli.resolution;
    }
    if let Some(format) = cli.format {
        settings.encoding_format = format;
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(program) = &cli.ffmpeg {
        settings.ffmpeg_program = program.clone();
    }
    settings.open_when_finished |= cli.open;
    settings.smoothed_eta |= cli.smoothed_eta;
    settings
}

fn build_request(settings: &Settings) -> Result<RenderRequest, RenderError> {
    let request = RenderRequest::new(
        settings.frames_per_second,
        &settings.timelapse_dir,
        settings.open_when_finished,
    )?
    .with_input_dir(&settings.picture_dir)
    .with_resolution(settings.resolution)
    .with_format(settings.encoding_format);
    Ok(request)
}

fn print_latest(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    match DirectoryFrameSource::new().latest_frame(&settings.picture_dir)? {
        Some(frame) => println!("{}", frame.path().display()),
        None => eprintln!("No pictures in {}", settings.picture_dir.display()),
    }
    Ok(())
}

/// Delivers one message per Ctrl-C. Without a handler the channel never
/// fires and the render can only run to completion.
fn interrupt_channel() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    }) {
        log::warn!("Could not install Ctrl-C handler: {e}");
    }
    rx
}

fn render(
    settings: &Settings,
    request: RenderRequest,
    interrupts: Receiver<()>,
) -> Result<RenderState, Box<dyn std::error::Error>> {
    let backend = settings.backend;
    let program = OsString::from(&settings.ffmpeg_program);
    let (tx, rx) = crossbeam_channel::unbounded();

    let engine = TimelapseEngine::new(
        Arc::new(DirectoryFrameSource::new()),
        move |request: &RenderRequest| {
            let options = EncoderOptions {
                format: request.format(),
                resolution: request.resolution(),
                ffmpeg_program: program.clone(),
            };
            create_encoder(backend, &options)
        },
        (tx, LogRenderObserver::default()),
        EngineConfig {
            picture_dir: settings.picture_dir.clone(),
            eta: if settings.smoothed_eta {
                EtaStrategy::Smoothed
            } else {
                EtaStrategy::LastFrame
            },
        },
    );

    wait_for_render(&engine, request, &rx, interrupts)
}

fn request_cancel(engine: &TimelapseEngine, handle: &RenderHandle) {
    eprintln!();
    if engine.cancel(handle) {
        eprintln!("Canceling after the current frame...");
    } else {
        eprintln!("Cannot cancel now, waiting for the render to end...");
    }
}

/// Submits `request` and prints its events until it ends. An interrupt asks
/// the engine to stop; the loop keeps draining until the terminal event.
fn wait_for_render(
    engine: &TimelapseEngine,
    request: RenderRequest,
    events: &Receiver<RenderEvent>,
    mut interrupts: Receiver<()>,
) -> Result<RenderState, Box<dyn std::error::Error>> {
    let handle = engine.submit(request)?;

    loop {
        let mut interrupts_closed = false;
        let event = crossbeam_channel::select! {
            recv(events) -> event => Some(event?),
            recv(interrupts) -> interrupt => {
                match interrupt {
                    Ok(()) => request_cancel(engine, &handle),
                    Err(_) => interrupts_closed = true,
                }
                None
            }
        };
        if interrupts_closed {
            interrupts = crossbeam_channel::never();
        }
        let Some(event) = event else {
            continue;
        };

        match &event {
            RenderEvent::Started { total, .. } => {
                eprintln!("Rendering {total} pictures...");
            }
            RenderEvent::Progress(progress) => {
                eprint!(
                    "\r{}/{} ({:.0}%)  ETA {}   ",
                    progress.completed(),
                    progress.total(),
                    progress.fraction() * 100.0,
                    progress.eta_string()
                );
                let _ = std::io::stderr().flush();
            }
            RenderEvent::Finalizing { .. } => {
                eprintln!();
                eprintln!("Finalizing video...");
            }
            _ => {}
        }
        if event.is_terminal() {
            eprintln!();
            break;
        }
    }

    engine
        .acknowledge()
        .ok_or_else(|| "render ended without a result".into())
}

fn report(state: RenderState) -> Result<(), Box<dyn std::error::Error>> {
    match state {
        RenderState::Succeeded {
            output_path,
            open_when_finished,
        } => {
            println!("{}", output_path.display());
            if open_when_finished {
                if let Err(e) = open::that(&output_path) {
                    log::warn!("Could not open {}: {e}", output_path.display());
                }
            }
            Ok(())
        }
        RenderState::Failed { reason } => Err(reason.into()),
        RenderState::Canceled => Err("render canceled".into()),
        RenderState::Idle | RenderState::Running { .. } => {
            Err("render ended without a result".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use timelapse_core::encoding::domain::encode_error::EncodeError;
    use timelapse_core::encoding::domain::encoder::Encoder;
    use timelapse_core::shared::frame::Frame;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("timelapse").chain(args.iter().copied()))
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = parse(&[
            "--pictures",
            "/pics",
            "--output-dir",
            "/videos",
            "--fps",
            "24",
            "--resolution",
            "1080p",
            "--format",
            "x265",
            "--backend",
            "in-process",
            "--ffmpeg",
            "/opt/ffmpeg",
            "--open",
            "--smoothed-eta",
        ]);
        let settings = apply(&cli, Settings::default());

        assert_eq!(settings.picture_dir, PathBuf::from("/pics"));
        assert_eq!(settings.timelapse_dir, PathBuf::from("/videos"));
        assert_eq!(settings.frames_per_second, 24);
        assert_eq!(settings.resolution, Some(Resolution::Res1080p));
        assert_eq!(settings.encoding_format, EncodingFormat::H265);
        assert_eq!(settings.backend, EncoderBackend::InProcess);
        assert_eq!(settings.ffmpeg_program, "/opt/ffmpeg");
        assert!(settings.open_when_finished);
        assert!(settings.smoothed_eta);
    }

    #[test]
    fn test_saved_settings_kept_without_flags() {
        let saved = Settings {
            frames_per_second: 30,
            open_when_finished: true,
            ..Settings::default()
        };
        let settings = apply(&parse(&[]), saved.clone());
        assert_eq!(settings, saved);
    }

    #[test]
    fn test_invalid_fps_rejected_before_render() {
        let settings = apply(&parse(&["--fps", "0"]), Settings::default());
        assert!(build_request(&settings).is_err());

        let settings = apply(&parse(&["--fps", "100"]), Settings::default());
        assert!(build_request(&settings).is_err());
    }

    #[test]
    fn test_request_uses_settings() {
        let settings = apply(
            &parse(&["--pictures", "/pics", "--output-dir", "/videos", "--fps", "12"]),
            Settings::default(),
        );
        let request = build_request(&settings).unwrap();
        assert_eq!(request.frames_per_second(), 12);
        assert_eq!(request.input_dir(), Some(std::path::Path::new("/pics")));
        assert_eq!(request.output_dir(), std::path::Path::new("/videos"));
    }

    #[test]
    fn test_unknown_resolution_is_a_parse_error() {
        let result = Cli::try_parse_from(["timelapse", "--resolution", "480p"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_report_failure_is_error() {
        let state = RenderState::Failed {
            reason: "no timelapse pictures found in /pics".to_string(),
        };
        let err = report(state).unwrap_err();
        assert!(err.to_string().contains("no timelapse pictures"));
        assert!(report(RenderState::Canceled).is_err());
    }

    #[test]
    fn test_render_reports_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            picture_dir: dir.path().join("pictures"),
            timelapse_dir: dir.path().join("timelapses"),
            ..Settings::default()
        };
        let request = build_request(&settings).unwrap();
        let (_tx, interrupts) = crossbeam_channel::bounded(1);
        let state = render(&settings, request, interrupts).unwrap();
        assert!(matches!(state, RenderState::Failed { .. }));
    }

    #[test]
    fn test_invalid_fps_is_invalid_request() {
        let settings = apply(&parse(&["--fps", "0"]), Settings::default());
        assert!(matches!(
            build_request(&settings),
            Err(RenderError::InvalidRequest(_))
        ));
    }

    /// Accepts frames slowly so an interrupt lands mid-render.
    struct SlowEncoder;

    impl Encoder for SlowEncoder {
        fn open(&mut self, _output_path: &Path, _fps: u32) -> Result<(), EncodeError> {
            Ok(())
        }

        fn encode_frame(&mut self, _frame: &Frame, _image: &[u8]) -> Result<(), EncodeError> {
            std::thread::sleep(Duration::from_millis(50));
            Ok(())
        }

        fn finish(&mut self) -> Result<(), EncodeError> {
            Ok(())
        }

        fn abort(&mut self) {}
    }

    fn slow_engine(
        pictures: &Path,
        frames: u32,
    ) -> (TimelapseEngine, Receiver<RenderEvent>) {
        std::fs::create_dir_all(pictures).unwrap();
        for day in 1..=frames {
            let name = format!("DayAfterDay-2020-02-{day:02}-09-30-00-B.jpg");
            std::fs::write(pictures.join(name), b"jpeg").unwrap();
        }
        let (tx, rx) = crossbeam_channel::unbounded();
        let engine = TimelapseEngine::new(
            Arc::new(DirectoryFrameSource::new()),
            |_request: &RenderRequest| -> Result<Box<dyn Encoder>, EncodeError> {
                Ok(Box::new(SlowEncoder))
            },
            tx,
            EngineConfig {
                picture_dir: pictures.to_path_buf(),
                eta: EtaStrategy::LastFrame,
            },
        );
        (engine, rx)
    }

    #[test]
    fn test_interrupt_cancels_render() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("timelapses");
        let (engine, events) = slow_engine(&dir.path().join("pictures"), 10);
        let request = RenderRequest::new(10, &output_dir, false).unwrap();

        let (interrupt, interrupts) = crossbeam_channel::bounded(1);
        interrupt.send(()).unwrap();
        let state = wait_for_render(&engine, request, &events, interrupts).unwrap();

        assert_eq!(state, RenderState::Canceled);
        assert_eq!(engine.state(), RenderState::Idle);
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_render_completes_without_interrupt_handler() {
        let dir = tempfile::tempdir().unwrap();
        let output_dir = dir.path().join("timelapses");
        let (engine, events) = slow_engine(&dir.path().join("pictures"), 2);
        let request = RenderRequest::new(10, &output_dir, false).unwrap();

        let (interrupt, interrupts) = crossbeam_channel::bounded::<()>(1);
        drop(interrupt);
        let state = wait_for_render(&engine, request, &events, interrupts).unwrap();

        assert!(matches!(state, RenderState::Succeeded { .. }));
    }
}
