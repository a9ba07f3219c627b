use std::time::Instant;

use crossbeam_channel::Sender;

use super::render_state::RenderEvent;

/// Receives render events on the worker thread.
///
/// Implementations may call back into the engine (for example to cancel)
/// but must not block waiting for the render to finish.
pub trait RenderObserver: Send {
    fn on_event(&mut self, event: &RenderEvent);
}

/// Forwards every event into a channel. A disconnected receiver is ignored.
impl RenderObserver for Sender<RenderEvent> {
    fn on_event(&mut self, event: &RenderEvent) {
        let _ = self.send(event.clone());
    }
}

/// Delivers each event to both observers, first `A` then `B`.
impl<A: RenderObserver, B: RenderObserver> RenderObserver for (A, B) {
    fn on_event(&mut self, event: &RenderEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }
}

/// Discards all events.
pub struct NullRenderObserver;

impl RenderObserver for NullRenderObserver {
    fn on_event(&mut self, _event: &RenderEvent) {}
}

/// Reports progress through `log`, throttled to every `throttle_frames`
/// frames, and a timing summary once the render ends.
pub struct LogRenderObserver {
    throttle_frames: usize,
    start_time: Option<Instant>,
    frame_ms: Vec<f64>,
    total_frames: usize,
}

impl LogRenderObserver {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            start_time: None,
            frame_ms: Vec::new(),
            total_frames: 0,
        }
    }

    /// Returns the formatted summary, or `None` if no frame was encoded.
    pub fn summary_string(&self) -> Option<String> {
        if self.frame_ms.is_empty() {
            return None;
        }

        let elapsed_ms = self
            .start_time
            .map_or(0.0, |t| t.elapsed().as_secs_f64() * 1000.0);
        let frames = self.frame_ms.len();
        let encode_ms: f64 = self.frame_ms.iter().sum();
        let avg_ms = encode_ms / frames as f64;
        let slowest_ms = self.frame_ms.iter().copied().fold(0.0, f64::max);

        let mut lines = vec![
            format!(
                "Render summary ({frames}/{} frames, {:.1}s total):",
                self.total_frames,
                elapsed_ms / 1000.0
            ),
            format!("  encode: avg {avg_ms:6.1}ms  max {slowest_ms:6.1}ms  total {encode_ms:7.0}ms"),
        ];

        if elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    fn reset(&mut self, total: usize) {
        self.start_time = Some(Instant::now());
        self.frame_ms.clear();
        self.total_frames = total;
    }

    fn log_summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

impl Default for LogRenderObserver {
    fn default() -> Self {
        Self::new(10)
    }
}

impl RenderObserver for LogRenderObserver {
    fn on_event(&mut self, event: &RenderEvent) {
        match event {
            RenderEvent::Started {
                output_path, total, ..
            } => {
                self.reset(*total);
                log::info!("Rendering {total} frames into {}", output_path.display());
            }
            RenderEvent::Progress(progress) => {
                self.frame_ms
                    .push(progress.last_frame_duration().as_secs_f64() * 1000.0);
                let (current, total) = (progress.completed(), progress.total());
                if current % self.throttle_frames == 0 || current == total {
                    log::info!(
                        "Encoding: {current}/{total} frames ({:.1}%), {} remaining",
                        progress.fraction() * 100.0,
                        progress.eta_string()
                    );
                }
            }
            RenderEvent::Finalizing { total } => {
                log::info!("All {total} frames encoded, finalizing video");
            }
            RenderEvent::Succeeded { output_path, .. } => {
                log::info!("Timelapse written to {}", output_path.display());
                self.log_summary();
            }
            RenderEvent::Failed { reason } => {
                log::warn!("Render failed: {reason}");
                self.log_summary();
            }
            RenderEvent::Canceled => {
                log::info!("Render canceled");
                self.log_summary();
            }
        }
    }
}
