//! Off-thread execution of session work.
//!
//! Workers never touch presentation state. Everything they produce is
//! marshalled back to the UI thread as [`Envelope`]s over an unbounded
//! channel, consumed strictly in send order; the `Finished` envelope is
//! always the last one sent for a session.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::model::{TaskOutcome, TaskPayload};
use crate::progress::RawProgress;
use crate::session::SessionId;

/// A message marshalled from a worker to the UI event loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub session: SessionId,
    pub event: TaskEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Progress(RawProgress),
    Finished(TaskOutcome),
}

/// Builds the progress callback handed to the fetch tool. Raw events are
/// forwarded for `session` until cancellation is requested; after that
/// the worker keeps running but its updates go nowhere.
pub fn progress_sink(
    session: SessionId,
    cancel: Arc<AtomicBool>,
    tx: UnboundedSender<Envelope>,
) -> impl FnMut(RawProgress) + Send + 'static {
    move |raw| {
        if !cancel.load(Ordering::Relaxed) {
            let _ = tx.send(Envelope {
                session,
                event: TaskEvent::Progress(raw),
            });
        }
    }
}

/// Spawns session work onto the Tokio runtime.
pub struct TaskRunner {
    handle: Handle,
}

impl TaskRunner {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Runs `op` off the UI thread and reports its outcome as the final
    /// envelope for `session`. Errors raised inside `op` are captured
    /// here and converted into `Failure`; nothing propagates across the
    /// thread boundary as a fault. A worker finishing after cancellation
    /// reports `Cancelled`, which the consumer drops as stale.
    pub fn run<F>(
        &self,
        session: SessionId,
        cancel: Arc<AtomicBool>,
        tx: UnboundedSender<Envelope>,
        op: F,
    ) where
        F: Future<Output = Result<TaskPayload>> + Send + 'static,
    {
        self.handle.spawn(async move {
            let result = op.await;
            let outcome = if cancel.load(Ordering::Relaxed) {
                TaskOutcome::Cancelled
            } else {
                match result {
                    Ok(payload) => TaskOutcome::Success(payload),
                    Err(e) => TaskOutcome::Failure(e.to_string()),
                }
            };
            let _ = tx.send(Envelope {
                session,
                event: TaskEvent::Finished(outcome),
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio::runtime::Runtime;
    use tokio::sync::mpsc::unbounded_channel;

    fn raw(percent: &str) -> RawProgress {
        RawProgress {
            status: "downloading".to_string(),
            percent: percent.to_string(),
            rate: None,
        }
    }

    #[test]
    fn progress_messages_precede_the_terminal_outcome() {
        let rt = Runtime::new().unwrap();
        let runner = TaskRunner::new(rt.handle().clone());
        let (tx, mut rx) = unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut sink = progress_sink(7, Arc::clone(&cancel), tx.clone());

        runner.run(7, cancel, tx, async move {
            for percent in ["10%", "50%", "90%"] {
                sink(raw(percent));
            }
            Ok(TaskPayload::Download)
        });

        rt.block_on(async {
            for expected in ["10%", "50%", "90%"] {
                let envelope = rx.recv().await.unwrap();
                assert_eq!(envelope.session, 7);
                assert_eq!(envelope.event, TaskEvent::Progress(raw(expected)));
            }
            let envelope = rx.recv().await.unwrap();
            assert_eq!(
                envelope.event,
                TaskEvent::Finished(TaskOutcome::Success(TaskPayload::Download))
            );
            // Channel closes once the worker is done; nothing follows.
            assert!(rx.recv().await.is_none());
        });
    }

    #[test]
    fn errors_become_failure_outcomes() {
        let rt = Runtime::new().unwrap();
        let runner = TaskRunner::new(rt.handle().clone());
        let (tx, mut rx) = unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        runner.run(1, cancel, tx, async {
            Err(Error::Download("boom".to_string()))
        });

        rt.block_on(async {
            let envelope = rx.recv().await.unwrap();
            match envelope.event {
                TaskEvent::Finished(TaskOutcome::Failure(message)) => {
                    assert!(message.contains("boom"));
                }
                other => panic!("unexpected event {other:?}"),
            }
        });
    }

    #[test]
    fn cancellation_suppresses_progress_and_marks_the_outcome() {
        let rt = Runtime::new().unwrap();
        let runner = TaskRunner::new(rt.handle().clone());
        let (tx, mut rx) = unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut sink = progress_sink(3, Arc::clone(&cancel), tx.clone());
        let flag = Arc::clone(&cancel);

        runner.run(3, cancel, tx, async move {
            sink(raw("30%"));
            // Cancellation lands mid-download.
            flag.store(true, Ordering::Relaxed);
            sink(raw("80%"));
            Ok(TaskPayload::Download)
        });

        rt.block_on(async {
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.event, TaskEvent::Progress(raw("30%")));
            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.event, TaskEvent::Finished(TaskOutcome::Cancelled));
            assert!(rx.recv().await.is_none());
        });
    }
}
