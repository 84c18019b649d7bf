// Scripted provider and recording views shared by unit tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::errors::ProviderError;
use super::models::{JobState, StreamDescriptor};
use super::traits::{JobView, MetadataProvider, Presenter, TransferObserver, VideoHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    Start,
    Progress(u8),
    Reset,
    Error(String),
    State(JobState),
}

#[derive(Default)]
pub struct RecordingView {
    calls: Mutex<Vec<ViewCall>>,
}

impl RecordingView {
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ViewCall::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn states(&self) -> Vec<JobState> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ViewCall::State(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: ViewCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl JobView for RecordingView {
    fn start_progress(&self) {
        self.push(ViewCall::Start);
    }

    fn set_progress(&self, percent: u8) {
        self.push(ViewCall::Progress(percent));
    }

    fn reset_progress(&self) {
        self.push(ViewCall::Reset);
    }

    fn show_error(&self, message: &str) {
        self.push(ViewCall::Error(message.to_string()));
    }

    fn on_state(&self, state: JobState) {
        self.push(ViewCall::State(state));
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    pub views: Vec<(String, Arc<RecordingView>)>,
}

impl Presenter for RecordingPresenter {
    fn add_view(&mut self, url: &str) -> Arc<dyn JobView> {
        let view = Arc::new(RecordingView::default());
        self.views.push((url.to_string(), view.clone()));
        view
    }
}

/// One recorded `VideoHandle::download` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub url: String,
    pub format_id: String,
    pub prefix: String,
}

/// Provider whose answers are fixed per URL
#[derive(Default)]
pub struct FakeProvider {
    catalogs: HashMap<String, Result<Vec<StreamDescriptor>, ProviderError>>,
    transfer_failures: HashMap<String, ProviderError>,
    chunk_size: u64,
    skip_complete_signal: bool,
    resolved: Arc<Mutex<Vec<String>>>,
    transfers: Arc<Mutex<Vec<TransferRecord>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            chunk_size: 100,
            ..Default::default()
        }
    }

    pub fn with_catalog(mut self, url: &str, catalog: Vec<StreamDescriptor>) -> Self {
        self.catalogs.insert(url.to_string(), Ok(catalog));
        self
    }

    pub fn with_resolve_error(mut self, url: &str, error: ProviderError) -> Self {
        self.catalogs.insert(url.to_string(), Err(error));
        self
    }

    /// Transfers of `format_id` fail halfway through
    pub fn with_transfer_error(mut self, format_id: &str, error: ProviderError) -> Self {
        self.transfer_failures.insert(format_id.to_string(), error);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Return from `download` without calling `on_complete`
    pub fn without_complete_signal(mut self) -> Self {
        self.skip_complete_signal = true;
        self
    }

    pub fn resolved(&self) -> Arc<Mutex<Vec<String>>> {
        self.resolved.clone()
    }

    pub fn transfers(&self) -> Arc<Mutex<Vec<TransferRecord>>> {
        self.transfers.clone()
    }
}

#[async_trait]
impl MetadataProvider for FakeProvider {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, url: &str) -> Result<Box<dyn VideoHandle>, ProviderError> {
        self.resolved.lock().unwrap().push(url.to_string());
        let catalog = self
            .catalogs
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::NotFound(url.to_string())))?;

        Ok(Box::new(FakeVideo {
            url: url.to_string(),
            streams: catalog,
            transfer_failures: self.transfer_failures.clone(),
            chunk_size: self.chunk_size.max(1),
            skip_complete_signal: self.skip_complete_signal,
            transfers: self.transfers.clone(),
        }))
    }
}

pub struct FakeVideo {
    url: String,
    streams: Vec<StreamDescriptor>,
    transfer_failures: HashMap<String, ProviderError>,
    chunk_size: u64,
    skip_complete_signal: bool,
    transfers: Arc<Mutex<Vec<TransferRecord>>>,
}

#[async_trait]
impl VideoHandle for FakeVideo {
    fn title(&self) -> &str {
        "Fake Video"
    }

    fn streams(&self) -> &[StreamDescriptor] {
        &self.streams
    }

    async fn download(
        &self,
        stream: &StreamDescriptor,
        output_dir: &Path,
        filename_prefix: &str,
        observer: &mut (dyn TransferObserver + Send),
    ) -> Result<PathBuf, ProviderError> {
        self.transfers.lock().unwrap().push(TransferRecord {
            url: self.url.clone(),
            format_id: stream.format_id.clone(),
            prefix: filename_prefix.to_string(),
        });
        let path = output_dir.join(format!("{}{}.{}", filename_prefix, self.title(), stream.subtype));

        let mut remaining = stream.filesize;
        while remaining > 0 {
            remaining = remaining.saturating_sub(self.chunk_size);
            observer.on_progress(remaining);
            if let Some(error) = self.transfer_failures.get(&stream.format_id) {
                if remaining <= stream.filesize / 2 {
                    return Err(error.clone());
                }
            }
            tokio::task::yield_now().await;
        }

        if !self.skip_complete_signal {
            observer.on_complete(&path);
        }
        Ok(path)
    }
}
