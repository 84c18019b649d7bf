// Download job - one URL from submission to completion or failure

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::bridge::{JobReporter, ProgressEvent};
use super::errors::DownloadError;
use super::format_selector::FormatSelector;
use super::models::{JobId, JobState, StreamDescriptor, StreamKind};
use super::progress::{ProgressTracker, TrackOutcome};
use super::settings::Settings;
use super::traits::{MetadataProvider, TransferObserver, VideoHandle};

/// File name prefix for a track. Only needed when both tracks land in the
/// same directory under the same title.
pub fn filename_prefix(kind: StreamKind, both_tracks: bool) -> String {
    if both_tracks {
        format!("({}) ", kind)
    } else {
        String::new()
    }
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    id: JobId,
    url: String,
    state: JobState,
    video: Option<StreamDescriptor>,
    audio: Option<StreamDescriptor>,
    bytes_expected_total: u64,
    bytes_completed: u64,
    last_error: Option<DownloadError>,
    outputs: Vec<PathBuf>,
}

impl DownloadJob {
    pub fn new(id: JobId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            state: JobState::Created,
            video: None,
            audio: None,
            bytes_expected_total: 0,
            bytes_completed: 0,
            last_error: None,
            outputs: Vec::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn video(&self) -> Option<&StreamDescriptor> {
        self.video.as_ref()
    }

    pub fn audio(&self) -> Option<&StreamDescriptor> {
        self.audio.as_ref()
    }

    pub fn bytes_expected_total(&self) -> u64 {
        self.bytes_expected_total
    }

    pub fn bytes_completed(&self) -> u64 {
        self.bytes_completed
    }

    pub fn last_error(&self) -> Option<&DownloadError> {
        self.last_error.as_ref()
    }

    /// Files written by completed tracks
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    pub fn advance(&mut self, next: JobState) -> Result<(), DownloadError> {
        if !self.state.can_advance_to(next) {
            return Err(DownloadError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(job = %self.id, from = %self.state, to = %next, "Job transition");
        self.state = next;
        Ok(())
    }

    /// Pick a variant for every enabled track and total up their sizes
    pub fn select_streams(
        &mut self,
        catalog: &[StreamDescriptor],
        settings: &Settings,
    ) -> Result<(), DownloadError> {
        let format = settings.content_format();

        if settings.download_video() {
            let target = settings.video_resolution();
            let stream = FormatSelector::select_video(catalog, format, target.as_str())?;
            debug!(job = %self.id, format_id = %stream.format_id, label = %stream.label, "Selected video");
            self.video = Some(stream.clone());
        }

        if settings.download_audio() {
            let target = settings.audio_bitrate_label();
            let stream = FormatSelector::select_audio(catalog, format, target)?;
            debug!(job = %self.id, format_id = %stream.format_id, label = %stream.label, "Selected audio");
            self.audio = Some(stream.clone());
        }

        self.bytes_expected_total = self.tracks().map(|s| s.filesize).sum();
        Ok(())
    }

    /// Drive the job to a terminal state, reporting through `reporter`
    pub async fn run(
        mut self,
        provider: Arc<dyn MetadataProvider>,
        settings: Settings,
        reporter: JobReporter,
    ) -> Self {
        if let Err(e) = self.execute(provider.as_ref(), &settings, &reporter).await {
            self.fail(e, &reporter);
        }
        self
    }

    async fn execute(
        &mut self,
        provider: &dyn MetadataProvider,
        settings: &Settings,
        reporter: &JobReporter,
    ) -> Result<(), DownloadError> {
        self.enter(JobState::Resolving, reporter)?;
        info!(job = %self.id, url = %self.url, provider = provider.name(), "Resolving");
        let video = provider
            .resolve(&self.url)
            .await
            .map_err(DownloadError::Resolution)?;

        self.enter(JobState::Selecting, reporter)?;
        self.select_streams(video.streams(), settings)?;

        self.enter(JobState::Downloading, reporter)?;
        reporter.emit(ProgressEvent::Started);
        info!(
            job = %self.id,
            title = video.title(),
            bytes = self.bytes_expected_total,
            "Downloading"
        );
        self.transfer(video.as_ref(), settings.output_directory(), reporter)
            .await?;

        self.finalize();
        self.enter(JobState::Completed, reporter)?;
        info!(job = %self.id, files = self.outputs.len(), "Download complete");
        Ok(())
    }

    /// Fetch the selected tracks one after another, video first
    async fn transfer(
        &mut self,
        video: &dyn VideoHandle,
        output_dir: &Path,
        reporter: &JobReporter,
    ) -> Result<(), DownloadError> {
        let tracks: Vec<StreamDescriptor> = self.tracks().cloned().collect();
        let both_tracks = tracks.len() > 1;
        let mut tracker = ProgressTracker::new(self.bytes_expected_total, tracks.len());

        for stream in &tracks {
            let prefix = filename_prefix(stream.kind, both_tracks);
            tracker.begin_track(stream.filesize);

            let mut observer = TrackObserver {
                tracker: &mut tracker,
                reporter,
            };
            let path = video
                .download(stream, output_dir, &prefix, &mut observer)
                .await
                .map_err(DownloadError::Transfer)?;
            // Returning normally counts as completion when the provider gave no signal
            observer.on_complete(&path);

            self.bytes_completed = tracker.bytes_completed();
            self.outputs.push(path);
        }
        Ok(())
    }

    /// Hook for post-processing written files. Separately fetched video and
    /// audio files are kept as they are; merging them would go here.
    fn finalize(&self) {
        debug!(job = %self.id, outputs = ?self.outputs, "Finalize (no-op)");
    }

    fn enter(&mut self, next: JobState, reporter: &JobReporter) -> Result<(), DownloadError> {
        self.advance(next)?;
        reporter.emit(ProgressEvent::State(next));
        Ok(())
    }

    fn fail(&mut self, error: DownloadError, reporter: &JobReporter) {
        warn!(job = %self.id, url = %self.url, error = %error, "Job failed");
        let message = error.user_message();
        self.last_error = Some(error);

        if self.state.can_advance_to(JobState::Failed) {
            self.state = JobState::Failed;
            reporter.emit(ProgressEvent::Failed(message));
            reporter.emit(ProgressEvent::State(JobState::Failed));
        }
    }

    fn tracks(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.video.iter().chain(self.audio.iter())
    }
}

/// Turns provider callbacks for one track into job-wide progress events
struct TrackObserver<'a> {
    tracker: &'a mut ProgressTracker,
    reporter: &'a JobReporter,
}

impl TransferObserver for TrackObserver<'_> {
    fn on_progress(&mut self, bytes_remaining: u64) {
        if let Some(percent) = self.tracker.on_progress(bytes_remaining) {
            self.reporter.emit(ProgressEvent::Progress(percent));
        }
    }

    fn on_complete(&mut self, path: &Path) {
        match self.tracker.on_track_complete() {
            TrackOutcome::JobComplete => {
                self.reporter.emit(ProgressEvent::Progress(100));
            }
            TrackOutcome::Suppressed => {
                debug!(job = %self.reporter.job_id(), path = %path.display(), "Track finished");
            }
            TrackOutcome::Duplicate => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::bridge::{self, BridgeReceiver};
    use crate::downloader::errors::{ProviderError, SelectionError};
    use crate::downloader::models::{ContentFormat, TrackSelection};
    use crate::downloader::testing::{FakeProvider, RecordingView};
    use tokio_util::sync::CancellationToken;

    const URL: &str = "https://www.youtube.com/watch?v=abc";

    fn catalog() -> Vec<StreamDescriptor> {
        vec![
            StreamDescriptor::progressive("18", "mp4", "360p", 5_000),
            StreamDescriptor::video("134", "mp4", "360p", 2_000),
            StreamDescriptor::video("136", "mp4", "720p", 8_000),
            StreamDescriptor::video("247", "webm", "720p", 7_000),
            StreamDescriptor::audio("140", "mp4", "128kbps", 2_000),
            StreamDescriptor::audio("251", "webm", "160kbps", 1_500),
        ]
    }

    fn settings(tracks: TrackSelection, format: ContentFormat) -> Settings {
        let mut s = Settings::defaults(&PathBuf::from("/tmp/out"));
        s.set_tracks(tracks);
        s.set_content_format(format);
        s
    }

    async fn run_job(provider: FakeProvider, settings: Settings) -> (DownloadJob, Vec<ProgressEvent>) {
        let (tx, mut rx) = bridge::channel();
        let reporter = JobReporter::new(
            JobId(7),
            tx,
            Arc::new(RecordingView::default()),
            CancellationToken::new(),
        );
        let job = DownloadJob::new(JobId(7), URL)
            .run(Arc::new(provider), settings, reporter)
            .await;
        (job, drain(&mut rx))
    }

    fn drain(rx: &mut BridgeReceiver) -> Vec<ProgressEvent> {
        std::iter::from_fn(|| rx.try_recv()).map(|m| m.event).collect()
    }

    fn progress_of(events: &[ProgressEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_video_and_audio_job_completes() {
        let provider = FakeProvider::new()
            .with_catalog(URL, catalog())
            .with_chunk_size(700);
        let transfers = provider.transfers();

        let (job, events) =
            run_job(provider, settings(TrackSelection::VideoAndAudio, ContentFormat::Mp4)).await;

        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(job.video().unwrap().format_id, "136");
        assert_eq!(job.audio().unwrap().format_id, "140");
        assert_eq!(job.bytes_expected_total(), 10_000);
        assert_eq!(job.bytes_completed(), 10_000);
        assert_eq!(job.outputs().len(), 2);

        let progress = progress_of(&events);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]), "{:?}", progress);
        assert_eq!(progress.iter().filter(|p| **p == 100).count(), 1);
        assert_eq!(progress.last(), Some(&100));

        // video before audio, prefixed because both tracks are fetched
        let transfers = transfers.lock().unwrap();
        let prefixes: Vec<(&str, &str)> = transfers
            .iter()
            .map(|t| (t.format_id.as_str(), t.prefix.as_str()))
            .collect();
        assert_eq!(prefixes, vec![("136", "(video) "), ("140", "(audio) ")]);

        // completion is the last thing reported
        assert_eq!(events.last(), Some(&ProgressEvent::State(JobState::Completed)));
        let started = events.iter().position(|e| *e == ProgressEvent::Started).unwrap();
        let downloading = events
            .iter()
            .position(|e| *e == ProgressEvent::State(JobState::Downloading))
            .unwrap();
        assert!(downloading < started);
    }

    #[tokio::test]
    async fn test_single_track_has_no_prefix() {
        let provider = FakeProvider::new().with_catalog(URL, catalog());
        let transfers = provider.transfers();

        let (job, events) = run_job(provider, settings(TrackSelection::Audio, ContentFormat::Webm)).await;

        assert_eq!(job.state(), JobState::Completed);
        assert!(job.video().is_none());
        assert_eq!(job.audio().unwrap().format_id, "251");
        assert_eq!(transfers.lock().unwrap()[0].prefix, "");
        assert_eq!(progress_of(&events).last(), Some(&100));
    }

    #[tokio::test]
    async fn test_missing_audio_for_format_fails_selection() {
        let webm_video_only = vec![StreamDescriptor::video("247", "webm", "720p", 7_000)];
        let provider = FakeProvider::new().with_catalog(URL, webm_video_only);
        let transfers = provider.transfers();

        let (job, events) =
            run_job(provider, settings(TrackSelection::VideoAndAudio, ContentFormat::Webm)).await;

        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(
            job.last_error(),
            Some(&DownloadError::Selection(SelectionError::NoMatchingStream {
                kind: StreamKind::Audio,
                format: ContentFormat::Webm,
            }))
        );
        assert!(transfers.lock().unwrap().is_empty());
        assert!(!events.contains(&ProgressEvent::Started));
        assert_eq!(events.last(), Some(&ProgressEvent::State(JobState::Failed)));
    }

    #[tokio::test]
    async fn test_resolution_error_is_classified() {
        let provider = FakeProvider::new().with_resolve_error(URL, ProviderError::AgeRestricted);

        let (job, events) =
            run_job(provider, settings(TrackSelection::VideoAndAudio, ContentFormat::Mp4)).await;

        assert_eq!(job.state(), JobState::Failed);
        assert!(events.contains(&ProgressEvent::Failed(
            "The video is age-restricted and cannot be accessed without logging in.".to_string()
        )));
        assert_eq!(
            events,
            vec![
                ProgressEvent::State(JobState::Resolving),
                ProgressEvent::Failed(
                    "The video is age-restricted and cannot be accessed without logging in."
                        .to_string()
                ),
                ProgressEvent::State(JobState::Failed),
            ]
        );
    }

    #[tokio::test]
    async fn test_transfer_error_fails_job() {
        let provider = FakeProvider::new()
            .with_catalog(URL, catalog())
            .with_transfer_error("140", ProviderError::MaxRetriesExceeded);

        let (job, events) =
            run_job(provider, settings(TrackSelection::VideoAndAudio, ContentFormat::Mp4)).await;

        assert_eq!(job.state(), JobState::Failed);
        assert_eq!(job.bytes_completed(), 8_000);
        assert!(progress_of(&events).iter().all(|p| *p < 100));
        assert!(matches!(
            job.last_error(),
            Some(DownloadError::Transfer(ProviderError::MaxRetriesExceeded))
        ));
    }

    #[tokio::test]
    async fn test_return_without_signal_still_completes() {
        let provider = FakeProvider::new()
            .with_catalog(URL, catalog())
            .without_complete_signal();

        let (job, events) = run_job(provider, settings(TrackSelection::Video, ContentFormat::Mp4)).await;

        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(progress_of(&events).iter().filter(|p| **p == 100).count(), 1);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut job = DownloadJob::new(JobId(1), URL);
        assert!(job.advance(JobState::Downloading).is_err());
        job.advance(JobState::Resolving).unwrap();
        job.advance(JobState::Failed).unwrap();
        assert_eq!(
            job.advance(JobState::Resolving),
            Err(DownloadError::InvalidTransition {
                from: JobState::Failed,
                to: JobState::Resolving
            })
        );
    }

    #[test]
    fn test_filename_prefix() {
        assert_eq!(filename_prefix(StreamKind::Video, true), "(video) ");
        assert_eq!(filename_prefix(StreamKind::Audio, true), "(audio) ");
        assert_eq!(filename_prefix(StreamKind::Audio, false), "");
    }
}
