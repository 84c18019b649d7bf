// Progress bridge - hands worker events to the single foreground consumer

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::models::{JobId, JobState};
use super::traits::JobView;

/// Something a worker wants shown for its job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    State(JobState),
    /// Transfer begins, bar goes from indeterminate to 0..100
    Started,
    Progress(u8),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct BridgeMessage {
    pub job_id: JobId,
    pub event: ProgressEvent,
}

/// Apply one event to a view
pub fn apply_event(view: &dyn JobView, event: &ProgressEvent) {
    match event {
        ProgressEvent::State(state) => view.on_state(*state),
        ProgressEvent::Started => view.start_progress(),
        ProgressEvent::Progress(percent) => view.set_progress(*percent),
        ProgressEvent::Failed(message) => view.show_error(message),
    }
}

/// Create a connected sender/receiver pair
pub fn channel() -> (BridgeSender, BridgeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BridgeSender { tx }, BridgeReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: mpsc::UnboundedSender<BridgeMessage>,
}

impl BridgeSender {
    /// Hands the message back when the receiver is gone
    pub fn send(&self, message: BridgeMessage) -> Result<(), BridgeMessage> {
        self.tx.send(message).map_err(|e| e.0)
    }
}

#[derive(Debug)]
pub struct BridgeReceiver {
    rx: mpsc::UnboundedReceiver<BridgeMessage>,
}

impl BridgeReceiver {
    pub async fn recv(&mut self) -> Option<BridgeMessage> {
        self.rx.recv().await
    }

    /// Non-blocking; `None` when nothing is queued
    pub fn try_recv(&mut self) -> Option<BridgeMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Worker-side handle for one job.
///
/// Once the token is cancelled nothing more is delivered. If the foreground
/// receiver no longer exists the event is applied to the view directly so
/// the final state is not lost.
#[derive(Clone)]
pub struct JobReporter {
    job_id: JobId,
    sender: BridgeSender,
    view: Arc<dyn JobView>,
    token: CancellationToken,
}

impl JobReporter {
    pub fn new(
        job_id: JobId,
        sender: BridgeSender,
        view: Arc<dyn JobView>,
        token: CancellationToken,
    ) -> Self {
        Self {
            job_id,
            sender,
            view,
            token,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn is_detached(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if self.is_detached() {
            trace!(job = %self.job_id, ?event, "Dropping event of detached job");
            return;
        }

        let message = BridgeMessage {
            job_id: self.job_id,
            event,
        };
        if let Err(message) = self.sender.send(message) {
            trace!(job = %self.job_id, "Foreground gone, applying event on worker");
            apply_event(self.view.as_ref(), &message.event);
        }
    }
}
