// Downloader module - settings, selection, jobs and the foreground orchestrator

pub mod backends;
pub mod bridge;
pub mod errors;
pub mod format_selector;
pub mod job;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod settings;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod testing;

pub use backends::YtDlpProvider;
pub use errors::{classify, ConfigError, DownloadError, ErrorCategory, ProviderError, SelectionError};
pub use models::{
    ContentFormat, JobId, JobState, Mp4AudioBitrate, NetworkConfig, SlotId, StreamDescriptor, StreamKind,
    TrackSelection, VideoResolution, WebmAudioBitrate,
};
pub use orchestrator::{Downloader, JobStatus};
pub use settings::{DownloadsDirProvider, PlatformDirs, Settings};
pub use traits::{JobView, MetadataProvider, Presenter, TransferObserver, VideoHandle};
