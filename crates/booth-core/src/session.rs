//! Kiosk session state machine.
//!
//! The visitor flow is an explicit value passed through the request cycle,
//! not a bag of ambient flags: each transition is a pure function of
//! (state, event). `Downloaded → Reset → Idle` is the intentional
//! kiosk-reset transition that readies the booth for the next visitor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    CameraOpen,
    PhotoCaptured,
    Submitted,
    Downloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    OpenCamera,
    CloseCamera,
    Capture,
    Submit,
    Download,
    Reset,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid session transition: {state:?} on {event:?}")]
pub struct TransitionError {
    pub state: SessionState,
    pub event: SessionEvent,
}

/// Apply an event to a session state.
pub fn transition(
    state: SessionState,
    event: SessionEvent,
) -> Result<SessionState, TransitionError> {
    use SessionEvent::*;
    use SessionState::*;

    let next = match (state, event) {
        (Idle, OpenCamera) => CameraOpen,
        // Form-only registration: no photo was taken.
        (Idle, Submit) => Submitted,
        (CameraOpen, Capture) => PhotoCaptured,
        (CameraOpen, CloseCamera) => Idle,
        // Retake.
        (PhotoCaptured, OpenCamera) => CameraOpen,
        (PhotoCaptured, Submit) => Submitted,
        (Submitted, Download) => Downloaded,
        // Finish without downloading.
        (Submitted, Reset) => Idle,
        (Downloaded, Reset) => Idle,
        (state, event) => return Err(TransitionError { state, event }),
    };

    tracing::debug!(?state, ?event, ?next, "session transition");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent::*;
    use SessionState::*;

    #[test]
    fn test_full_kiosk_cycle() {
        let mut s = Idle;
        for (event, expected) in [
            (OpenCamera, CameraOpen),
            (Capture, PhotoCaptured),
            (Submit, Submitted),
            (Download, Downloaded),
            (Reset, Idle),
        ] {
            s = transition(s, event).unwrap();
            assert_eq!(s, expected);
        }
    }

    #[test]
    fn test_form_only_registration() {
        let s = transition(Idle, Submit).unwrap();
        assert_eq!(s, Submitted);
        assert_eq!(transition(s, Reset).unwrap(), Idle);
    }

    #[test]
    fn test_retake() {
        let s = transition(CameraOpen, Capture).unwrap();
        assert_eq!(transition(s, OpenCamera).unwrap(), CameraOpen);
    }

    #[test]
    fn test_close_camera_without_capture() {
        assert_eq!(transition(CameraOpen, CloseCamera).unwrap(), Idle);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        for (state, event) in [
            (Idle, Capture),
            (Idle, Download),
            (CameraOpen, Submit),
            (PhotoCaptured, Download),
            (Submitted, Capture),
            (Downloaded, Download),
            (Downloaded, Submit),
        ] {
            let err = transition(state, event).unwrap_err();
            assert_eq!(err.state, state);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn test_download_requires_submission() {
        assert!(transition(PhotoCaptured, Download).is_err());
        assert!(transition(Submitted, Download).is_ok());
    }
}
