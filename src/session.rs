//! Session lifecycle state machine.
//!
//! One session covers one user-initiated operation (info fetch or
//! download). The machine is the sole gate deciding which commands are
//! accepted, so a second worker can never start while one is in flight.
//! It is only ever touched from the UI thread; workers report back by
//! session id through [`crate::task`] and never mutate it directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Opaque token identifying one session.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    FetchingInfo,
    Ready,
    Downloading,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    /// Terminal states are transient: they last until acknowledged.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether the download control is enabled.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Ready) || self.is_terminal()
    }

    /// Whether the cancel control is enabled. Info fetches cannot be
    /// cancelled, only downloads.
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Downloading)
    }

    /// Whether an info fetch may start.
    pub const fn can_fetch_info(self) -> bool {
        matches!(self, Self::Idle) || self.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    InfoFetch,
    Download,
}

/// Handle to the active session, handed to the task runner when a worker
/// starts. The cancel flag is shared with the worker's progress callback.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: SessionId,
    pub kind: SessionKind,
    pub cancel: Arc<AtomicBool>,
}

/// Rejections surfaced synchronously, before any worker starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a video URL is required")]
    EmptyUrl,
    #[error("another operation is already running")]
    Busy,
}

pub struct SessionMachine {
    state: SessionState,
    next_id: SessionId,
    active: Option<Ticket>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            next_id: 0,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Id of the session whose worker messages are still applied.
    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|t| t.id)
    }

    /// `Idle → FetchingInfo`. A terminal state counts as acknowledged
    /// when a new request arrives.
    pub fn begin_info_fetch(&mut self, url: &str) -> Result<Ticket, SessionError> {
        if url.trim().is_empty() {
            return Err(SessionError::EmptyUrl);
        }
        if self.state.is_terminal() {
            self.acknowledge();
        }
        if self.state != SessionState::Idle {
            return Err(SessionError::Busy);
        }
        Ok(self.activate(SessionKind::InfoFetch, SessionState::FetchingInfo))
    }

    /// `Idle|Ready → Downloading`. The info-fetch step is optional.
    pub fn begin_download(&mut self, url: &str) -> Result<Ticket, SessionError> {
        if url.trim().is_empty() {
            return Err(SessionError::EmptyUrl);
        }
        if self.state.is_terminal() {
            self.acknowledge();
        }
        if !matches!(self.state, SessionState::Idle | SessionState::Ready) {
            return Err(SessionError::Busy);
        }
        Ok(self.activate(SessionKind::Download, SessionState::Downloading))
    }

    fn activate(&mut self, kind: SessionKind, state: SessionState) -> Ticket {
        self.next_id += 1;
        let ticket = Ticket {
            id: self.next_id,
            kind,
            cancel: Arc::new(AtomicBool::new(false)),
        };
        self.active = Some(ticket.clone());
        self.state = state;
        log::debug!("session {} ({:?}) started", ticket.id, ticket.kind);
        ticket
    }

    /// `Downloading → Cancelled`. Sets the shared cancel flag and stops
    /// accepting messages from the in-flight worker, which is left to run
    /// to completion. Returns false when nothing was cancellable.
    pub fn request_cancel(&mut self) -> bool {
        if self.state != SessionState::Downloading {
            return false;
        }
        if let Some(ticket) = self.active.take() {
            ticket.cancel.store(true, Ordering::Relaxed);
            log::debug!("session {} cancelled", ticket.id);
        }
        self.state = SessionState::Cancelled;
        true
    }

    /// Worker success for `id`: `FetchingInfo → Ready` or
    /// `Downloading → Completed`. Stale ids are ignored.
    pub fn complete(&mut self, id: SessionId) -> bool {
        if self.active_id() != Some(id) {
            return false;
        }
        self.active = None;
        self.state = match self.state {
            SessionState::FetchingInfo => SessionState::Ready,
            _ => SessionState::Completed,
        };
        log::debug!("session {id} finished: {:?}", self.state);
        true
    }

    /// Worker failure for `id`: `FetchingInfo|Downloading → Failed`.
    /// Stale ids are ignored.
    pub fn fail(&mut self, id: SessionId) -> bool {
        if self.active_id() != Some(id) {
            return false;
        }
        self.active = None;
        self.state = SessionState::Failed;
        log::debug!("session {id} failed");
        true
    }

    /// Presentation-layer acknowledgment of a terminal outcome:
    /// `Completed|Cancelled|Failed → Idle`.
    pub fn acknowledge(&mut self) {
        if self.state.is_terminal() {
            self.state = SessionState::Idle;
        }
    }
}
