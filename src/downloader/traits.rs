// Seams to the external collaborators: metadata provider and presentation layer

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::errors::ProviderError;
use super::models::{JobState, StreamDescriptor};

/// Resolves URLs into downloadable videos
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Look up the video behind `url` and its stream catalog
    async fn resolve(&self, url: &str) -> Result<Box<dyn VideoHandle>, ProviderError>;
}

/// A resolved video, owned by the job that resolved it
#[async_trait]
pub trait VideoHandle: Send + Sync {
    fn title(&self) -> &str;

    /// Every variant the provider offers, in provider order
    fn streams(&self) -> &[StreamDescriptor];

    /// Fetch one variant into `output_dir`, prefixing the file name with
    /// `filename_prefix`. Reports remaining bytes to `observer` while running
    /// and signals completion before returning the written path.
    async fn download(
        &self,
        stream: &StreamDescriptor,
        output_dir: &Path,
        filename_prefix: &str,
        observer: &mut (dyn TransferObserver + Send),
    ) -> Result<PathBuf, ProviderError>;
}

/// Callbacks invoked by a provider during one transfer
pub trait TransferObserver {
    fn on_progress(&mut self, bytes_remaining: u64);

    fn on_complete(&mut self, path: &Path);
}

/// One UI unit showing a single job
///
/// Called on the foreground consumer, except when the foreground is gone,
/// in which case the worker calls it directly.
pub trait JobView: Send + Sync {
    fn start_progress(&self);

    fn set_progress(&self, percent: u8);

    fn reset_progress(&self);

    fn show_error(&self, message: &str);

    /// Lifecycle notification; views that only show a bar can ignore it
    fn on_state(&self, _state: JobState) {}
}

/// Creates new UI units when a submission fans out to several URLs
pub trait Presenter {
    fn add_view(&mut self, url: &str) -> Arc<dyn JobView>;
}
