use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};

use crate::encoding::domain::encode_error::EncodeError;
use crate::encoding::domain::encoder::{remove_partial_output, Encoder};
use crate::frames::domain::frame_source::FrameSource;
use crate::progress::progress_estimator::{EtaStrategy, Progress};
use crate::shared::constants::{OUTPUT_EXTENSION, TIMESTAMP_FORMAT};
use crate::shared::render_request::RenderRequest;

use super::render_error::RenderError;
use super::render_observer::RenderObserver;
use super::render_state::{RenderEvent, RenderHandle, RenderState};

/// Builds a fresh encoder for each render, configured from its request.
pub type EncoderFactory =
    dyn Fn(&RenderRequest) -> Result<Box<dyn Encoder>, EncodeError> + Send + Sync;

const PANIC_REASON: &str = "render worker panicked";

/// Numbered variants tried when the timestamped output name is taken.
const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Frames are listed from here unless the request names its own directory.
    pub picture_dir: PathBuf,
    pub eta: EtaStrategy,
}

/// Runs at most one render at a time on a dedicated worker thread.
///
/// A render moves the engine from `Idle` to `Running` and then to exactly
/// one terminal state. The terminal state stays in place, and further
/// submissions are rejected, until the caller calls [`acknowledge`].
///
/// [`acknowledge`]: TimelapseEngine::acknowledge
pub struct TimelapseEngine {
    shared: Arc<Shared>,
    frame_source: Arc<dyn FrameSource>,
    encoder_factory: Arc<EncoderFactory>,
    observer: Arc<Mutex<Box<dyn RenderObserver>>>,
    config: EngineConfig,
}

struct Shared {
    busy: AtomicBool,
    cancel_requested: AtomicBool,
    /// Set once the last frame was handed over and `finish` is running.
    finishing: AtomicBool,
    /// Id of the running render, 0 when none.
    current: AtomicU64,
    next_id: AtomicU64,
    state: Mutex<RenderState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TimelapseEngine {
    pub fn new<F, O>(
        frame_source: Arc<dyn FrameSource>,
        encoder_factory: F,
        observer: O,
        config: EngineConfig,
    ) -> Self
    where
        F: Fn(&RenderRequest) -> Result<Box<dyn Encoder>, EncodeError> + Send + Sync + 'static,
        O: RenderObserver + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                busy: AtomicBool::new(false),
                cancel_requested: AtomicBool::new(false),
                finishing: AtomicBool::new(false),
                current: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                state: Mutex::new(RenderState::Idle),
            }),
            frame_source,
            encoder_factory: Arc::new(encoder_factory),
            observer: Arc::new(Mutex::new(Box::new(observer))),
            config,
        }
    }

    /// Starts a render in the background and returns immediately.
    pub fn submit(&self, request: RenderRequest) -> Result<RenderHandle, RenderError> {
        if self
            .shared
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Rejected submission: render already in progress");
            return Err(RenderError::AlreadyRunning);
        }

        let handle = RenderHandle::new(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.cancel_requested.store(false, Ordering::Release);
        self.shared.finishing.store(false, Ordering::Release);
        self.shared.current.store(handle.id(), Ordering::Release);
        *self.shared.lock_state() = RenderState::Running {
            handle,
            progress: None,
        };

        let job = RenderJob {
            shared: self.shared.clone(),
            frame_source: self.frame_source.clone(),
            encoder_factory: self.encoder_factory.clone(),
            observer: self.observer.clone(),
            input_dir: request
                .input_dir()
                .unwrap_or(&self.config.picture_dir)
                .to_path_buf(),
            eta: self.config.eta,
            request,
            handle,
        };

        let spawned = thread::Builder::new()
            .name(format!("timelapse-render-{}", handle.id()))
            .spawn(move || job.execute());

        if let Err(e) = spawned {
            self.shared.current.store(0, Ordering::Release);
            *self.shared.lock_state() = RenderState::Idle;
            self.shared.busy.store(false, Ordering::Release);
            return Err(RenderError::WorkerSpawn(e));
        }

        log::info!("Submitted render {}", handle.id());
        Ok(handle)
    }

    /// Asks the render identified by `handle` to stop at the next frame
    /// boundary. Returns `true` only when this call set the request.
    ///
    /// Once every frame has been encoded and the video is being finalized
    /// there is no boundary left, so the request is refused.
    pub fn cancel(&self, handle: &RenderHandle) -> bool {
        let state = self.shared.lock_state();
        let running = matches!(&*state, RenderState::Running { handle: h, .. } if h == handle);
        if !running || self.shared.current.load(Ordering::Acquire) != handle.id() {
            return false;
        }
        if self.shared.finishing.load(Ordering::Acquire) {
            log::info!("Render {} is finalizing, too late to cancel", handle.id());
            return false;
        }

        let newly_set = !self.shared.cancel_requested.swap(true, Ordering::AcqRel);
        if newly_set {
            log::info!("Cancellation requested for render {}", handle.id());
        }
        newly_set
    }

    /// Consumes a terminal state and returns the engine to `Idle`.
    pub fn acknowledge(&self) -> Option<RenderState> {
        let mut state = self.shared.lock_state();
        if !state.is_terminal() {
            return None;
        }
        let finished = std::mem::replace(&mut *state, RenderState::Idle);
        self.shared.busy.store(false, Ordering::Release);
        Some(finished)
    }

    pub fn state(&self) -> RenderState {
        self.shared.lock_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }
}

/// `<prefix>-<yyyy-MM-dd-HH-mm-ss>.mp4`
pub fn output_file_name(prefix: &str, at: NaiveDateTime) -> String {
    format!("{prefix}-{}.{OUTPUT_EXTENSION}", at.format(TIMESTAMP_FORMAT))
}

/// Creates an empty output file in `dir` and returns its path.
///
/// Uses [`output_file_name`], or `<prefix>-<stamp>-<n>.mp4` when that name
/// is already taken, so an existing video is never overwritten.
pub fn reserve_output_path(dir: &Path, prefix: &str, at: NaiveDateTime) -> io::Result<PathBuf> {
    let stamp = at.format(TIMESTAMP_FORMAT);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            output_file_name(prefix, at)
        } else {
            format!("{prefix}-{stamp}-{attempt}.{OUTPUT_EXTENSION}")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free output name for {prefix}-{stamp}"),
    ))
}

enum Outcome {
    Succeeded(PathBuf),
    Canceled,
}

struct RenderJob {
    shared: Arc<Shared>,
    frame_source: Arc<dyn FrameSource>,
    encoder_factory: Arc<EncoderFactory>,
    observer: Arc<Mutex<Box<dyn RenderObserver>>>,
    input_dir: PathBuf,
    eta: EtaStrategy,
    request: RenderRequest,
    handle: RenderHandle,
}

impl RenderJob {
    fn execute(self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run()));

        let terminal = match result {
            Ok(Ok(Outcome::Succeeded(output_path))) => {
                log::info!("Render {} succeeded: {}", self.handle.id(), output_path.display());
                RenderState::Succeeded {
                    output_path,
                    open_when_finished: self.request.open_when_finished(),
                }
            }
            Ok(Ok(Outcome::Canceled)) => {
                log::info!("Render {} canceled", self.handle.id());
                RenderState::Canceled
            }
            Ok(Err(e)) => {
                log::warn!("Render {} failed: {e}", self.handle.id());
                RenderState::Failed {
                    reason: e.to_string(),
                }
            }
            Err(_) => {
                log::error!("Render {}: {PANIC_REASON}", self.handle.id());
                RenderState::Failed {
                    reason: PANIC_REASON.to_string(),
                }
            }
        };

        let event = RenderEvent::terminal(&terminal);
        {
            let mut state = self.shared.lock_state();
            self.shared.current.store(0, Ordering::Release);
            *state = terminal;
        }
        if let Some(event) = event {
            self.emit(&event);
        }
    }

    fn run(&self) -> Result<Outcome, RenderError> {
        let frames = self.frame_source.list(&self.input_dir)?;
        let total = frames.len();
        log::info!("Listed {total} frames from {}", self.input_dir.display());

        let output_dir = self.request.output_dir();
        fs::create_dir_all(output_dir).map_err(|source| RenderError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let encoder = (self.encoder_factory)(&self.request)?;
        let output_path =
            reserve_output_path(output_dir, self.request.prefix(), Local::now().naive_local())
                .map_err(|source| RenderError::OutputFile {
                    dir: output_dir.to_path_buf(),
                    source,
                })?;
        // Dropping `encoder` on any early return aborts it and removes the
        // reserved file.
        let mut encoder = AbortOnDrop::new(encoder, output_path.clone());

        self.emit(&RenderEvent::Started {
            handle: self.handle,
            output_path: output_path.clone(),
            total,
        });

        encoder
            .get()
            .open(&output_path, self.request.frames_per_second())?;

        let mut estimator = self.eta.estimator();
        for frame in &frames {
            if self.cancel_requested() {
                return Ok(Outcome::Canceled);
            }

            let bytes = read_frame(frame.path())?;
            log::debug!("Encoding frame {}/{total}: {}", frame.index() + 1, frame.file_name());

            let started = Instant::now();
            encoder.get().encode_frame(frame, &bytes)?;
            let progress = estimator.estimate(frame.index() + 1, total, started.elapsed());

            self.record_progress(&progress);
            self.emit(&RenderEvent::Progress(progress));
        }

        if !self.enter_finishing() {
            return Ok(Outcome::Canceled);
        }
        self.emit(&RenderEvent::Finalizing { total });

        encoder.get().finish()?;
        encoder.disarm();
        Ok(Outcome::Succeeded(output_path))
    }

    fn cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }

    /// Last frame boundary. Checked under the state lock so a concurrent
    /// `cancel` either lands before it or is refused.
    fn enter_finishing(&self) -> bool {
        let _state = self.shared.lock_state();
        if self.cancel_requested() {
            return false;
        }
        self.shared.finishing.store(true, Ordering::Release);
        true
    }

    fn record_progress(&self, progress: &Progress) {
        let mut state = self.shared.lock_state();
        if let RenderState::Running { handle, progress: p } = &mut *state {
            if *handle == self.handle {
                *p = Some(progress.clone());
            }
        }
    }

    /// Must not be called while the state lock is held.
    fn emit(&self, event: &RenderEvent) {
        self.observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_event(event);
    }
}

fn read_frame(path: &Path) -> Result<Vec<u8>, RenderError> {
    fs::read(path).map_err(|source| RenderError::FrameRead {
        path: path.to_path_buf(),
        source,
    })
}

/// Aborts the wrapped encoder and deletes the reserved output when
/// dropped, unless disarmed after a successful finish. Covers early returns
/// and panics alike.
struct AbortOnDrop {
    encoder: Box<dyn Encoder>,
    output_path: PathBuf,
    armed: bool,
}

impl AbortOnDrop {
    fn new(encoder: Box<dyn Encoder>, output_path: PathBuf) -> Self {
        Self {
            encoder,
            output_path,
            armed: true,
        }
    }

    fn get(&mut self) -> &mut dyn Encoder {
        self.encoder.as_mut()
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.encoder.abort();
            remove_partial_output(&self.output_path);
        }
    }
}
