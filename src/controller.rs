//! UI-thread facade over the downloader core.
//!
//! The controller owns the session state machine, the marshalling
//! channel and the last applied progress value. The presentation layer
//! issues requests into it and drains [`CoreEvent`]s out of `poll()`
//! every frame; it is the single consumer of worker messages and the
//! only place session state is ever mutated.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

use crate::fetch::MediaFetcher;
use crate::model::{DownloadRequest, Progress, TaskOutcome, TaskPayload, VideoInfo};
use crate::progress;
use crate::session::{SessionError, SessionId, SessionMachine, SessionState};
use crate::task::{Envelope, TaskEvent, TaskRunner, progress_sink};

/// Notification surfaced to the presentation layer by [`Controller::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    StateChanged(SessionState),
    ProgressUpdated(Progress),
    InfoReceived(VideoInfo),
    OperationFailed(String),
}

pub struct Controller {
    machine: SessionMachine,
    runner: TaskRunner,
    fetcher: Arc<dyn MediaFetcher>,
    rx: Option<UnboundedReceiver<Envelope>>,
    progress: Progress,
    info: Option<VideoInfo>,
    events: Vec<CoreEvent>,
}

impl Controller {
    pub fn new(handle: Handle, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            machine: SessionMachine::new(),
            runner: TaskRunner::new(handle),
            fetcher,
            rx: None,
            progress: Progress::default(),
            info: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn info(&self) -> Option<&VideoInfo> {
        self.info.as_ref()
    }

    pub fn can_start(&self) -> bool {
        self.machine.state().can_start()
    }

    pub fn can_cancel(&self) -> bool {
        self.machine.state().can_cancel()
    }

    pub fn can_fetch_info(&self) -> bool {
        self.machine.state().can_fetch_info()
    }

    /// Starts a metadata lookup for `url` on a worker.
    pub fn request_info_fetch(&mut self, url: &str) -> Result<(), SessionError> {
        let ticket = self.machine.begin_info_fetch(url)?;
        self.note_state();

        let (tx, rx) = unbounded_channel();
        self.rx = Some(rx);
        let fetcher = Arc::clone(&self.fetcher);
        let url = url.trim().to_string();
        log::info!("fetching info for {url}");
        self.runner.run(ticket.id, ticket.cancel, tx, async move {
            let info = fetcher.fetch_info(&url).await?;
            Ok(TaskPayload::Info(info))
        });
        Ok(())
    }

    /// Starts a download on a worker. The previous info-fetch step is
    /// optional; this is accepted straight from Idle.
    pub fn request_download(&mut self, request: DownloadRequest) -> Result<(), SessionError> {
        let ticket = self.machine.begin_download(&request.url)?;
        self.progress = Progress::default();
        self.note_state();
        self.events.push(CoreEvent::ProgressUpdated(self.progress.clone()));

        let (tx, rx) = unbounded_channel();
        self.rx = Some(rx);
        let sink = progress_sink(ticket.id, Arc::clone(&ticket.cancel), tx.clone());
        let fetcher = Arc::clone(&self.fetcher);
        log::info!(
            "downloading {} to {} as {}",
            request.url,
            request.destination.display(),
            request.effective_format().label()
        );
        self.runner.run(ticket.id, ticket.cancel, tx, async move {
            fetcher.download(&request, Box::new(sink)).await?;
            Ok(TaskPayload::Download)
        });
        Ok(())
    }

    /// Cancels the in-flight download, if any. The session moves to
    /// Cancelled immediately; the worker runs on but every message it
    /// still produces is discarded.
    pub fn request_cancel(&mut self) {
        if self.machine.request_cancel() {
            self.rx = None;
            log::info!("download cancelled");
            self.note_state();
        }
    }

    /// Presentation-layer acknowledgment of a terminal outcome.
    pub fn acknowledge(&mut self) {
        let before = self.machine.state();
        self.machine.acknowledge();
        if self.machine.state() != before {
            self.note_state();
        }
    }

    /// Applies all pending worker messages without blocking and returns
    /// the notifications they produced. Called once per frame by the
    /// event loop.
    pub fn poll(&mut self) -> Vec<CoreEvent> {
        while let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(envelope) => self.apply(envelope),
                Err(_) => break,
            }
        }
        std::mem::take(&mut self.events)
    }

    fn apply(&mut self, envelope: Envelope) {
        if self.machine.active_id() != Some(envelope.session) {
            log::debug!("dropping stale message for session {}", envelope.session);
            return;
        }
        match envelope.event {
            TaskEvent::Progress(raw) => {
                self.progress = progress::translate(&raw, self.progress.percent);
                self.events.push(CoreEvent::ProgressUpdated(self.progress.clone()));
            }
            TaskEvent::Finished(outcome) => {
                self.settle(envelope.session, outcome);
                self.rx = None;
            }
        }
    }

    fn settle(&mut self, session: SessionId, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success(TaskPayload::Info(info)) => {
                self.machine.complete(session);
                self.info = Some(info.clone());
                self.events.push(CoreEvent::InfoReceived(info));
            }
            TaskOutcome::Success(TaskPayload::Download) => {
                self.machine.complete(session);
                self.progress.percent = 100.0;
                self.events.push(CoreEvent::ProgressUpdated(self.progress.clone()));
            }
            TaskOutcome::Failure(message) => {
                self.machine.fail(session);
                log::warn!("operation failed: {message}");
                self.events.push(CoreEvent::OperationFailed(message));
            }
            // The machine already settled when the user cancelled; a
            // worker reporting in afterwards was filtered as stale.
            TaskOutcome::Cancelled => return,
        }
        self.note_state();
    }

    fn note_state(&mut self) {
        self.events.push(CoreEvent::StateChanged(self.machine.state()));
    }
}
