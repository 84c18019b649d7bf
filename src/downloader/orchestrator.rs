// Orchestrator - foreground owner of every UI unit and its job
//
// Each slot (UI unit) holds at most one running job. Workers only talk
// back through the progress bridge; the foreground drains it in pump()
// or run_until_idle() and applies events to the slot's view.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::bridge::{self, apply_event, BridgeMessage, BridgeReceiver, BridgeSender, JobReporter, ProgressEvent};
use super::errors::DownloadError;
use super::job::DownloadJob;
use super::models::{JobId, JobState, SlotId};
use super::settings::Settings;
use super::traits::{JobView, MetadataProvider, Presenter};

const IDLE_POLL: Duration = Duration::from_millis(50);

/// Split pasted text into URLs, one per whitespace-separated token
pub fn split_submission(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Foreground mirror of a job's UI-visible state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatus {
    pub job_id: JobId,
    pub url: String,
    pub state: JobState,
    pub percent: Option<u8>,
    pub error: Option<String>,
}

impl JobStatus {
    fn new(job_id: JobId, url: &str) -> Self {
        Self {
            job_id,
            url: url.to_string(),
            state: JobState::Created,
            percent: None,
            error: None,
        }
    }

    fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::State(state) => self.state = *state,
            ProgressEvent::Started => self.percent = Some(0),
            ProgressEvent::Progress(percent) => self.percent = Some(*percent),
            ProgressEvent::Failed(message) => self.error = Some(message.clone()),
        }
    }
}

struct Worker {
    job_id: JobId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct JobSlot {
    view: Arc<dyn JobView>,
    status: Option<JobStatus>,
    worker: Option<Worker>,
}

pub struct Downloader {
    provider: Arc<dyn MetadataProvider>,
    sender: BridgeSender,
    receiver: BridgeReceiver,
    slots: HashMap<SlotId, JobSlot>,
    jobs: HashMap<JobId, SlotId>,
    next_slot: u64,
    next_job: u64,
}

impl Downloader {
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        let (sender, receiver) = bridge::channel();
        Self {
            provider,
            sender,
            receiver,
            slots: HashMap::new(),
            jobs: HashMap::new(),
            next_slot: 0,
            next_job: 0,
        }
    }

    /// Register an idle UI unit
    pub fn add_slot(&mut self, view: Arc<dyn JobView>) -> SlotId {
        self.next_slot += 1;
        let id = SlotId(self.next_slot);
        self.slots.insert(
            id,
            JobSlot {
                view,
                status: None,
                worker: None,
            },
        );
        id
    }

    /// Submit text typed or pasted into `slot`. The first URL replaces the
    /// slot's job (after its previous worker has stopped); every further URL
    /// gets a new slot from `presenter`. Returns the slots that were started.
    pub async fn submit(
        &mut self,
        slot: SlotId,
        text: &str,
        settings: &Settings,
        presenter: &mut dyn Presenter,
    ) -> Result<Vec<SlotId>, DownloadError> {
        if !self.slots.contains_key(&slot) {
            return Err(DownloadError::UnknownSlot(slot));
        }

        let mut urls = split_submission(text).into_iter();
        let Some(first) = urls.next() else {
            debug!(slot = %slot, "Empty submission ignored");
            return Ok(Vec::new());
        };

        self.cancel(slot).await;
        self.start(slot, &first, settings)?;

        let mut started = vec![slot];
        for url in urls {
            let view = presenter.add_view(&url);
            let extra = self.add_slot(view);
            self.start(extra, &url, settings)?;
            started.push(extra);
        }
        Ok(started)
    }

    /// Stop the slot's worker and wait for it to wind down.
    /// Returns whether a worker was running.
    pub async fn cancel(&mut self, slot: SlotId) -> bool {
        let Some(worker) = self
            .slots
            .get_mut(&slot)
            .and_then(|s| s.worker.take())
        else {
            return false;
        };

        worker.token.cancel();
        self.jobs.remove(&worker.job_id);
        if let Err(e) = worker.handle.await {
            warn!(job = %worker.job_id, error = %e, "Worker ended abnormally");
        }
        debug!(slot = %slot, job = %worker.job_id, "Worker cancelled");
        true
    }

    /// Tear down a UI unit. Its worker is detached, not awaited: anything it
    /// still produces is discarded.
    pub fn remove(&mut self, slot: SlotId) -> bool {
        let Some(removed) = self.slots.remove(&slot) else {
            return false;
        };
        if let Some(worker) = removed.worker {
            worker.token.cancel();
            self.jobs.remove(&worker.job_id);
            debug!(slot = %slot, job = %worker.job_id, "Worker detached");
        }
        true
    }

    pub fn remove_all(&mut self) {
        let slots: Vec<SlotId> = self.slots.keys().copied().collect();
        for slot in slots {
            self.remove(slot);
        }
        info!("All downloads removed");
    }

    pub fn status(&self, slot: SlotId) -> Option<&JobStatus> {
        self.slots.get(&slot).and_then(|s| s.status.as_ref())
    }

    /// Every submitted slot with its status, in creation order
    pub fn statuses(&self) -> Vec<(SlotId, JobStatus)> {
        let mut all: Vec<(SlotId, JobStatus)> = self
            .slots
            .iter()
            .filter_map(|(id, s)| s.status.clone().map(|status| (*id, status)))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn has_active_workers(&self) -> bool {
        self.slots
            .values()
            .filter_map(|s| s.worker.as_ref())
            .any(|w| !w.handle.is_finished())
    }

    /// Apply every queued event without waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Some(message) = self.receiver.try_recv() {
            self.dispatch(message);
            handled += 1;
        }
        handled
    }

    /// Apply events until every worker has finished and its events are shown
    pub async fn run_until_idle(&mut self) {
        while self.has_active_workers() {
            if let Ok(Some(message)) = tokio::time::timeout(IDLE_POLL, self.receiver.recv()).await {
                self.dispatch(message);
            }
        }
        self.pump();
    }

    fn start(&mut self, slot_id: SlotId, url: &str, settings: &Settings) -> Result<(), DownloadError> {
        self.next_job += 1;
        let job_id = JobId(self.next_job);
        let slot = self
            .slots
            .get_mut(&slot_id)
            .ok_or(DownloadError::UnknownSlot(slot_id))?;

        slot.view.reset_progress();
        slot.status = Some(JobStatus::new(job_id, url));

        let token = CancellationToken::new();
        let reporter = JobReporter::new(job_id, self.sender.clone(), slot.view.clone(), token.clone());
        let job = DownloadJob::new(job_id, url);
        let provider = self.provider.clone();
        let settings = settings.clone();
        let worker_token = token.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = worker_token.cancelled() => {
                    debug!(job = %job_id, "Worker stopped after cancellation");
                }
                job = job.run(provider, settings, reporter) => {
                    debug!(job = %job_id, state = %job.state(), "Worker finished");
                }
            }
        });

        info!(slot = %slot_id, job = %job_id, url = %url, "Job submitted");
        slot.worker = Some(Worker {
            job_id,
            token,
            handle,
        });
        self.jobs.insert(job_id, slot_id);
        Ok(())
    }

    fn dispatch(&mut self, message: BridgeMessage) {
        let Some(slot_id) = self.jobs.get(&message.job_id).copied() else {
            trace!(job = %message.job_id, "Dropping event of a replaced or removed job");
            return;
        };
        let Some(slot) = self.slots.get_mut(&slot_id) else {
            return;
        };

        if let Some(status) = slot.status.as_mut() {
            status.apply(&message.event);
        }
        apply_event(slot.view.as_ref(), &message.event);
    }
}
