use std::path::PathBuf;

use crate::progress::progress_estimator::Progress;

/// Identifies one render attempt. Only valid while that render runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderHandle(u64);

impl RenderHandle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    Idle,
    /// `progress` is `None` until the first frame has been encoded.
    Running {
        handle: RenderHandle,
        progress: Option<Progress>,
    },
    Succeeded {
        output_path: PathBuf,
        open_when_finished: bool,
    },
    Failed {
        reason: String,
    },
    Canceled,
}

impl RenderState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderState::Succeeded { .. } | RenderState::Failed { .. } | RenderState::Canceled
        )
    }
}

/// Notifications pushed by the engine while a render runs. Every render
/// ends with exactly one terminal event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderEvent {
    Started {
        handle: RenderHandle,
        output_path: PathBuf,
        total: usize,
    },
    Progress(Progress),
    /// Every frame was accepted and the encoder is writing the video. The
    /// render can no longer be canceled.
    Finalizing {
        total: usize,
    },
    Succeeded {
        output_path: PathBuf,
        open_when_finished: bool,
    },
    Failed {
        reason: String,
    },
    Canceled,
}

impl RenderEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderEvent::Succeeded { .. } | RenderEvent::Failed { .. } | RenderEvent::Canceled
        )
    }

    /// The event announcing a terminal state, if `state` is one.
    pub fn terminal(state: &RenderState) -> Option<Self> {
        match state {
            RenderState::Succeeded {
                output_path,
                open_when_finished,
            } => Some(RenderEvent::Succeeded {
                output_path: output_path.clone(),
                open_when_finished: *open_when_finished,
            }),
            RenderState::Failed { reason } => Some(RenderEvent::Failed {
                reason: reason.clone(),
            }),
            RenderState::Canceled => Some(RenderEvent::Canceled),
            RenderState::Idle | RenderState::Running { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!RenderState::Idle.is_terminal());
        assert!(!RenderState::Running {
            handle: RenderHandle::new(1),
            progress: None
        }
        .is_terminal());
        assert!(RenderState::Canceled.is_terminal());
        assert!(RenderState::Failed {
            reason: "x".to_string()
        }
        .is_terminal());
    }

    #[test]
    fn test_terminal_event_mirrors_state() {
        let state = RenderState::Succeeded {
            output_path: PathBuf::from("/out/a.mp4"),
            open_when_finished: true,
        };
        assert_eq!(
            RenderEvent::terminal(&state),
            Some(RenderEvent::Succeeded {
                output_path: PathBuf::from("/out/a.mp4"),
                open_when_finished: true,
            })
        );
        assert_eq!(RenderEvent::terminal(&RenderState::Idle), None);
        assert!(RenderEvent::terminal(&RenderState::Canceled)
            .unwrap()
            .is_terminal());
    }
}
